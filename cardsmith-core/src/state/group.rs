//! Groups: named runs of layers that toggle visibility together.

/// Group ids come from the page's group counter, so unlike [`super::LayerId`] they are
/// persisted. Never reused within a page, even after the group is deleted.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);
impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Group#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    pub name: String,
    pub visible: bool,
    /// Remembered insertion point while the group has no members. Meaningless otherwise.
    pub(crate) position_hint: Option<usize>,
}
impl Group {
    #[must_use]
    pub fn new(id: GroupId, name: String) -> Self {
        Self {
            id,
            name,
            visible: true,
            position_hint: None,
        }
    }
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }
    #[must_use]
    pub fn position_hint(&self) -> Option<usize> {
        self.position_hint
    }
}

/// Default display names, supplied by whoever owns the string tables.
#[derive(Copy, Clone, Debug)]
pub struct Naming {
    /// Name of the `n`th group created on a page.
    pub group: fn(u32) -> String,
    /// Name of the `n`th text layer created on a page.
    pub text: fn(u32) -> String,
    /// Content of a text layer created without any.
    pub text_placeholder: fn() -> String,
}
impl Default for Naming {
    fn default() -> Self {
        Self {
            group: |n| format!("Group {n}"),
            text: |n| format!("Text {n}"),
            text_placeholder: || "Text".to_owned(),
        }
    }
}
