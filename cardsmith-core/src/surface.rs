//! # Rendering surface boundary
//!
//! The scene graph that draws layers, hit-tests them and rasterizes the result lives outside
//! this crate, behind [`RenderSurface`]. [`CanvasAdapter`] keeps one in step with a
//! [`LayerStore`] by diffing, and always hands over the complete stacking order rather than
//! patching it.

use crate::geometry::Geometry;
use crate::settings::ExportFormat;
use crate::state::layer::{Adjustments, ImageSource, TextData};
use crate::state::{Layer, LayerId, LayerKind, LayerStore, Placement};
use crate::util::Rect;

#[derive(Clone, Debug, PartialEq)]
pub enum RenderContent {
    Image(ImageSource),
    Text(TextData),
}

/// Everything a surface needs to draw one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Renderable {
    pub id: LayerId,
    pub placement: Placement,
    pub visible: bool,
    /// Locked layers can be seen but not picked or dragged.
    pub interactive: bool,
    pub adjustments: Option<Adjustments>,
    pub content: RenderContent,
}
impl From<&Layer> for Renderable {
    fn from(layer: &Layer) -> Self {
        Self {
            id: layer.id(),
            placement: layer.placement,
            visible: layer.visible,
            interactive: !layer.locked,
            adjustments: layer.adjustments,
            content: match &layer.kind {
                LayerKind::Image(image) => RenderContent::Image(image.clone()),
                LayerKind::Text(text) => RenderContent::Text(text.clone()),
            },
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SurfaceError {
    #[error("surface does not know {0}")]
    UnknownObject(LayerId),
    #[error("rasterizing failed: {0}")]
    Rasterize(String),
}

/// Implemented by the renderer.
pub trait RenderSurface {
    fn add_object(&mut self, object: &Renderable) -> Result<(), SurfaceError>;
    fn remove_object(&mut self, id: LayerId) -> Result<(), SurfaceError>;
    fn update_object(&mut self, object: &Renderable) -> Result<(), SurfaceError>;
    /// Every object the surface holds, back-most first.
    fn set_z_order(&mut self, back_to_front: &[LayerId]) -> Result<(), SurfaceError>;
    fn request_render(&mut self);
    /// Encode the pixels under `region` (canvas pixels), scaled by `scale`.
    fn rasterize(
        &mut self,
        region: Rect,
        scale: f64,
        format: ExportFormat,
    ) -> Result<Vec<u8>, SurfaceError>;
}

/// Something the user did on the surface.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    SelectionChanged(Option<LayerId>),
    /// After a drag, resize or rotate.
    ObjectModified(LayerId, Placement),
    /// In-place text editing finished with this content.
    TextEditingExited(LayerId, String),
}

/// Mirror of what the surface currently holds.
#[derive(Default, Debug)]
pub struct CanvasAdapter {
    mirrored: hashbrown::HashMap<LayerId, Renderable>,
    /// Back-most first.
    order: Vec<LayerId>,
}
impl CanvasAdapter {
    /// Forget the mirror, so the next sync re-adds everything. For a fresh surface.
    pub fn reset(&mut self) {
        self.mirrored.clear();
        self.order.clear();
    }
    #[must_use]
    pub fn order(&self) -> &[LayerId] {
        &self.order
    }
    /// Bring the surface in line with the store. Returns whether anything was sent.
    pub fn sync(
        &mut self,
        store: &LayerStore,
        surface: &mut impl RenderSurface,
    ) -> Result<bool, SurfaceError> {
        let mut dirty = false;

        let stale: Vec<LayerId> = self
            .mirrored
            .keys()
            .copied()
            .filter(|id| store.layer(*id).is_none())
            .collect();
        for id in stale {
            surface.remove_object(id)?;
            self.mirrored.remove(&id);
            dirty = true;
        }

        for layer in store.layers() {
            let object = Renderable::from(layer);
            match self.mirrored.get(&object.id) {
                Some(known) if *known == object => (),
                Some(_) => {
                    surface.update_object(&object)?;
                    self.mirrored.insert(object.id, object);
                    dirty = true;
                }
                None => {
                    surface.add_object(&object)?;
                    self.mirrored.insert(object.id, object);
                    dirty = true;
                }
            }
        }

        let order: Vec<LayerId> = store.layers().iter().rev().map(Layer::id).collect();
        if order != self.order {
            surface.set_z_order(&order)?;
            self.order = order;
            dirty = true;
        }
        if dirty {
            log::trace!("surface synced, {} objects", self.order.len());
            surface.request_render();
        }
        Ok(dirty)
    }
}

/// Rasterize the full print image at printer resolution.
pub fn export_print(
    surface: &mut impl RenderSurface,
    geometry: &Geometry,
    format: ExportFormat,
) -> Result<Vec<u8>, SurfaceError> {
    surface.rasterize(geometry.image_rect(), geometry.print_export_scale(), format)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::util::test::png_bytes;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Add(LayerId),
        Remove(LayerId),
        Update(LayerId),
        Order(Vec<LayerId>),
        Render,
        Rasterize(Rect, f64, ExportFormat),
    }

    /// Records every call.
    #[derive(Default)]
    pub struct MockSurface {
        pub calls: Vec<Call>,
    }
    impl MockSurface {
        pub fn take(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }
    impl RenderSurface for MockSurface {
        fn add_object(&mut self, object: &Renderable) -> Result<(), SurfaceError> {
            self.calls.push(Call::Add(object.id));
            Ok(())
        }
        fn remove_object(&mut self, id: LayerId) -> Result<(), SurfaceError> {
            self.calls.push(Call::Remove(id));
            Ok(())
        }
        fn update_object(&mut self, object: &Renderable) -> Result<(), SurfaceError> {
            self.calls.push(Call::Update(object.id));
            Ok(())
        }
        fn set_z_order(&mut self, back_to_front: &[LayerId]) -> Result<(), SurfaceError> {
            self.calls.push(Call::Order(back_to_front.to_vec()));
            Ok(())
        }
        fn request_render(&mut self) {
            self.calls.push(Call::Render);
        }
        fn rasterize(
            &mut self,
            region: Rect,
            scale: f64,
            format: ExportFormat,
        ) -> Result<Vec<u8>, SurfaceError> {
            self.calls.push(Call::Rasterize(region, scale, format));
            Ok(png_bytes(1, 1))
        }
    }

    #[test]
    fn sync_diffs() {
        let mut store = LayerStore::default();
        let mut surface = MockSurface::default();
        let mut adapter = CanvasAdapter::default();
        let text = store.add_text(None);
        let image = store.add_image(png_bytes(2, 2), "a.png").unwrap();

        assert!(adapter.sync(&store, &mut surface).unwrap());
        assert_eq!(
            surface.take(),
            vec![
                Call::Add(image),
                Call::Add(text),
                Call::Order(vec![text, image]),
                Call::Render,
            ]
        );
        // Nothing changed, nothing sent.
        assert!(!adapter.sync(&store, &mut surface).unwrap());
        assert!(surface.calls.is_empty());

        store.toggle_lock(text);
        store.reorder(0, 1);
        assert!(adapter.sync(&store, &mut surface).unwrap());
        assert_eq!(
            surface.take(),
            vec![
                Call::Update(text),
                Call::Order(vec![image, text]),
                Call::Render,
            ]
        );

        store.remove_layer(image);
        adapter.sync(&store, &mut surface).unwrap();
        assert_eq!(
            surface.take(),
            vec![Call::Remove(image), Call::Order(vec![text]), Call::Render]
        );
    }
    #[test]
    fn locked_not_interactive() {
        let mut store = LayerStore::default();
        let id = store.add_text(Some("x"));
        store.toggle_lock(id);
        let object = Renderable::from(store.layer(id).unwrap());
        assert!(!object.interactive);
        assert!(object.visible);
    }
    #[test]
    fn print_export_region() {
        let geometry = Geometry::default();
        let mut surface = MockSurface::default();
        let bytes = export_print(&mut surface, &geometry, ExportFormat::Png).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(
            surface.take(),
            vec![Call::Rasterize(
                geometry.image_rect(),
                geometry.print_export_scale(),
                ExportFormat::Png
            )]
        );
    }
}
