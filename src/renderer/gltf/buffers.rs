use crate::renderer::device::{BufferHandle, Device};
use crate::renderer::gltf::Gltf;
use crate::renderer::RenderError;

/// Device buffers for the buffer views of an asset, indexed by buffer view.
///
/// Only views that declare a target are uploaded. Views without one are
/// left out, so accessors reading from them are not drawn.
pub struct BufferRegistry {
    buffers: Vec<Option<BufferHandle>>,
}

impl BufferRegistry {
    pub fn upload<D: Device>(device: &mut D, asset: &Gltf) -> Result<BufferRegistry, RenderError> {
        let mut registry = BufferRegistry {
            buffers: Vec::with_capacity(asset.buffer_views.len()),
        };
        for (index, view) in asset.buffer_views.iter().enumerate() {
            let Some(target) = view.target else {
                log::warn!("bufferView {index} has no target, skipping it");
                registry.buffers.push(None);
                continue;
            };
            let uploaded = asset
                .view_bytes(index)
                .map_err(RenderError::from)
                .and_then(|bytes| device.create_buffer(target, bytes));
            match uploaded {
                Ok(buffer) => {
                    log::debug!(
                        "bufferView {index}: {} bytes at offset {} of buffer {}",
                        view.byte_length,
                        view.byte_offset,
                        view.buffer
                    );
                    registry.buffers.push(Some(buffer));
                }
                Err(err) => {
                    registry.release(device);
                    return Err(err);
                }
            }
        }
        Ok(registry)
    }

    /// The device buffer holding the given buffer view, if it was uploaded.
    pub fn get(&self, view: usize) -> Option<BufferHandle> {
        self.buffers.get(view).copied().flatten()
    }

    /// Number of buffer views that were uploaded.
    pub fn uploaded(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    pub fn release<D: Device>(&mut self, device: &mut D) {
        for buffer in self.buffers.drain(..).flatten() {
            device.delete_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::{AssetError, Buffer, BufferTarget, BufferView};
    use crate::renderer::testing::{empty_asset, triangle_asset, RecordingDevice};

    #[test]
    fn uploads_exactly_the_view_bytes() {
        let asset = triangle_asset();
        let mut device = RecordingDevice::new();
        let registry = BufferRegistry::upload(&mut device, &asset).unwrap();

        for (index, view) in asset.buffer_views.iter().enumerate() {
            match view.target {
                Some(target) => {
                    let handle = registry.get(index).unwrap();
                    let (uploaded_target, bytes) = &device.buffers[&handle];
                    assert_eq!(*uploaded_target, target);
                    assert_eq!(bytes.len(), view.byte_length);
                    let source = &asset.buffers[view.buffer].data;
                    assert_eq!(
                        &bytes[..],
                        &source[view.byte_offset..view.byte_offset + view.byte_length]
                    );
                }
                None => assert_eq!(registry.get(index), None),
            }
        }
        assert_eq!(registry.uploaded(), device.buffers.len());
    }

    #[test]
    fn out_of_range_view_is_fatal() {
        let mut asset = empty_asset();
        asset.buffers.push(Buffer { data: vec![0; 8] });
        asset.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: 0,
            byte_length: 8,
            byte_stride: None,
            target: Some(BufferTarget::ArrayBuffer),
        });
        asset.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: 4,
            byte_length: 8,
            byte_stride: None,
            target: Some(BufferTarget::ArrayBuffer),
        });
        let mut device = RecordingDevice::new();
        let result = BufferRegistry::upload(&mut device, &asset);
        assert!(matches!(
            result,
            Err(RenderError::Asset(AssetError::BufferViewOutOfRange { view: 1, .. }))
        ));
        // The view uploaded before the failure is released again.
        assert_eq!(device.deleted_buffers.len(), 1);
    }

    #[test]
    fn release_deletes_every_buffer() {
        let asset = triangle_asset();
        let mut device = RecordingDevice::new();
        let mut registry = BufferRegistry::upload(&mut device, &asset).unwrap();
        let uploaded = registry.uploaded();
        registry.release(&mut device);
        assert_eq!(device.deleted_buffers.len(), uploaded);
        assert_eq!(registry.uploaded(), 0);
    }
}
