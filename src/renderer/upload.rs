//! 临时上传缓冲区
//!
//! 顶点和索引数据每帧都会被重写，因此直接放在上传堆（CPU 可写、GPU 可读）中。
//! 缓冲区在初始化时按配置的最大容量创建一次，之后只重写内容，从不重新分配。

use tracing::trace;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::{Backend, Device, Resource};

/// 缓冲区用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

impl BufferKind {
    pub fn name(&self) -> &'static str {
        match self {
            BufferKind::Vertex => "vertex",
            BufferKind::Index => "index",
        }
    }
}

/// 上传堆上的固定容量缓冲区
pub struct TransientBuffer<B: Backend> {
    resource: B::Resource,
    kind: BufferKind,
    capacity: usize,
}

impl<B: Backend> TransientBuffer<B> {
    /// 在上传堆上创建容量为 `capacity` 字节的缓冲区
    pub fn create(device: &B::Device, kind: BufferKind, capacity: usize) -> Result<Self> {
        let resource = device
            .create_upload_buffer(capacity as u64)
            .map_err(GraphicsError::init("CreateCommittedResource"))?;

        Ok(Self { resource, kind, capacity })
    }

    /// 容量（字节）
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn gpu_address(&self) -> u64 {
        self.resource.gpu_virtual_address()
    }

    /// 检查 `len` 字节能否放入缓冲区
    pub fn check_capacity(&self, len: usize) -> Result<()> {
        if len > self.capacity {
            return Err(GraphicsError::CapacityExceeded {
                buffer: self.kind.name(),
                requested: len,
                capacity: self.capacity,
            }
            .into());
        }
        Ok(())
    }

    /// 用 `bytes` 覆盖缓冲区开头
    ///
    /// 映射时读取范围为空（CPU 不读），解除映射时不指定写入范围。
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        self.check_capacity(bytes.len())?;

        let mapped = self.resource.map(0..0).map_err(GraphicsError::mapping("Map"))?;
        // SAFETY: 映射区域至少有 capacity 字节，上面已检查 bytes.len() <= capacity
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.as_ptr(), bytes.len());
        }
        self.resource.unmap(None).map_err(GraphicsError::mapping("Unmap"))?;

        trace!(buffer = self.kind.name(), bytes = bytes.len(), "Upload buffer written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DistFrameError;
    use crate::gfx::api::Factory;
    use crate::gfx::mock::{MockCall, MockGpu, MockOp};
    use crate::gfx::types::FeatureLevel;

    fn device(gpu: &MockGpu) -> <MockGpu as Backend>::Device {
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap()
    }

    #[test]
    fn test_write_copies_bytes() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let buffer = TransientBuffer::<MockGpu>::create(&device, BufferKind::Index, 8).unwrap();

        buffer.write(&[9, 8, 7]).unwrap();

        let bytes = gpu.buffer_bytes(buffer.gpu_address()).unwrap();
        assert_eq!(&bytes[..3], &[9, 8, 7]);
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn test_oversized_write_is_rejected_before_mapping() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let buffer = TransientBuffer::<MockGpu>::create(&device, BufferKind::Vertex, 4).unwrap();

        let err = buffer.write(&[0; 5]).unwrap_err();

        assert!(matches!(
            err,
            DistFrameError::Graphics(GraphicsError::CapacityExceeded { buffer: "vertex", requested: 5, capacity: 4 })
        ));
        assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Map { .. })), 0);
    }

    #[test]
    fn test_map_failure() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let buffer = TransientBuffer::<MockGpu>::create(&device, BufferKind::Vertex, 4).unwrap();
        gpu.fail_operation(MockOp::Map);

        assert!(matches!(
            buffer.write(&[1]),
            Err(DistFrameError::Graphics(GraphicsError::Mapping { op: "Map", .. }))
        ));
    }
}
