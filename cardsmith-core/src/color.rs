//! Opaque sRGB colors, as used for text fills, page backgrounds and cutting marks.
//!
//! Persisted everywhere as a `#rrggbb` string.

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("color must start with '#'")]
    MissingHash,
    #[error("expected 3 or 6 hex digits, found {}", .0)]
    BadLength(usize),
    #[error("invalid hex digit")]
    BadDigit,
}

/// An 8-bit-per-channel sRGB color.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Rgb(pub [u8; 3]);
impl Rgb {
    pub const WHITE: Self = Self([0xFF; 3]);
    pub const BLACK: Self = Self([0x00; 3]);
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }
    /// Lowercase `#rrggbb`.
    #[must_use]
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}
impl std::str::FromStr for Rgb {
    type Err = ColorParseError;
    /// Accepts `#rgb` and `#rrggbb`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix('#').ok_or(ColorParseError::MissingHash)?;
        // from_str_radix would also take a sign.
        if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(ColorParseError::BadDigit);
        }
        let channel = |hex: &str| u8::from_str_radix(hex, 16).map_err(|_| ColorParseError::BadDigit);
        match digits.len() {
            3 => {
                let mut out = [0u8; 3];
                for (slot, idx) in out.iter_mut().zip(0..3) {
                    // Short form doubles each digit: "f" -> "ff"
                    *slot = channel(&digits[idx..=idx])? * 0x11;
                }
                Ok(Self(out))
            }
            6 => Ok(Self([
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            ])),
            len => Err(ColorParseError::BadLength(len)),
        }
    }
}
impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl serde::Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
impl<'de> serde::Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::{ColorParseError, Rgb};
    #[test]
    fn parse_forms() {
        assert_eq!("#ff8000".parse(), Ok(Rgb::new(0xFF, 0x80, 0x00)));
        assert_eq!("#FF8000".parse(), Ok(Rgb::new(0xFF, 0x80, 0x00)));
        assert_eq!("#f80".parse(), Ok(Rgb::new(0xFF, 0x88, 0x00)));
        assert_eq!("ff8000".parse::<Rgb>(), Err(ColorParseError::MissingHash));
        assert_eq!("#ff80".parse::<Rgb>(), Err(ColorParseError::BadLength(4)));
        assert_eq!("#gg0000".parse::<Rgb>(), Err(ColorParseError::BadDigit));
        assert_eq!("#+f+f+f".parse::<Rgb>(), Err(ColorParseError::BadDigit));
        assert_eq!("#+ff".parse::<Rgb>(), Err(ColorParseError::BadDigit));
    }
    #[test]
    fn serde_as_hex_string() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 255)).unwrap();
        assert_eq!(json, "\"#0102ff\"");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rgb::new(1, 2, 255));
        assert!(serde_json::from_str::<Rgb>("\"red\"").is_err());
    }
}
