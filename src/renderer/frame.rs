//! 帧资源
//!
//! 每个交换链缓冲区对应一个帧槽，槽内有独立的命令分配器、栅栏和栅栏值。
//! 分配器只有在该槽上一次提交的工作完成后才会被重置，
//! 这由上一帧结束时的栅栏等待保证。

use tracing::debug;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::{Backend, Device};
use crate::gfx::types::{CommandListType, FRAME_COUNT};

use super::sync::FenceValue;

/// 单个帧槽
///
/// 字段按获取顺序的逆序声明，析构时先释放栅栏再释放分配器。
pub struct FrameSlot<B: Backend> {
    fence: B::Fence,
    allocator: B::CommandAllocator,
    fence_value: FenceValue,
}

impl<B: Backend> FrameSlot<B> {
    fn create(device: &B::Device, index: usize) -> Result<Self> {
        let allocator = device
            .create_command_allocator(CommandListType::Direct)
            .map_err(GraphicsError::init("CreateCommandAllocator"))?;
        let fence = device.create_fence(0).map_err(GraphicsError::init("CreateFence"))?;

        debug!(slot = index, "Frame slot created");
        Ok(Self { fence, allocator, fence_value: FenceValue::default() })
    }

    pub fn allocator(&self) -> &B::CommandAllocator {
        &self.allocator
    }

    pub fn fence(&self) -> &B::Fence {
        &self.fence
    }

    /// 该槽最后一次提交对应的栅栏值
    pub fn fence_value(&self) -> FenceValue {
        self.fence_value
    }

    /// 栅栏值加一并返回新值
    pub fn advance(&mut self) -> FenceValue {
        self.fence_value.increment();
        self.fence_value
    }
}

/// 全部帧槽
///
/// 析构时从最后一个槽开始释放。
pub struct FrameResources<B: Backend> {
    slots: Vec<FrameSlot<B>>,
}

impl<B: Backend> FrameResources<B> {
    /// 为每个槽创建命令分配器和初始值为 0 的栅栏
    ///
    /// 任何一次创建失败都会释放本次已经创建的全部对象。
    pub fn initialize(device: &B::Device) -> Result<Self> {
        let slots: [FrameSlot<B>; FRAME_COUNT] =
            array_init::try_array_init(|index| FrameSlot::create(device, index))?;
        Ok(Self { slots: Vec::from(slots) })
    }

    pub fn slot(&self, index: usize) -> &FrameSlot<B> {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut FrameSlot<B> {
        &mut self.slots[index]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<B: Backend> Drop for FrameResources<B> {
    fn drop(&mut self) {
        while let Some(slot) = self.slots.pop() {
            drop(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::api::Factory;
    use crate::gfx::mock::{MockGpu, ObjectKind};
    use crate::gfx::types::FeatureLevel;

    fn device(gpu: &MockGpu) -> <MockGpu as Backend>::Device {
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap()
    }

    #[test]
    fn test_slots_start_at_zero() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let frames = FrameResources::<MockGpu>::initialize(&device).unwrap();

        assert_eq!(frames.len(), FRAME_COUNT);
        for i in 0..frames.len() {
            assert_eq!(frames.slot(i).fence_value().value(), 0);
        }
        assert_eq!(gpu.created(ObjectKind::CommandAllocator), FRAME_COUNT);
        assert_eq!(gpu.created(ObjectKind::Fence), FRAME_COUNT);
    }

    #[test]
    fn test_advance_increments_by_one() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let mut frames = FrameResources::<MockGpu>::initialize(&device).unwrap();

        assert_eq!(frames.slot_mut(1).advance().value(), 1);
        assert_eq!(frames.slot_mut(1).advance().value(), 2);
        assert_eq!(frames.slot(0).fence_value().value(), 0);
    }

    #[test]
    fn test_partial_failure_releases_created_slots() {
        let gpu = MockGpu::new();
        gpu.fail_creation(ObjectKind::Fence, 2);
        let device = device(&gpu);

        assert!(FrameResources::<MockGpu>::initialize(&device).is_err());
        assert_eq!(gpu.created(ObjectKind::CommandAllocator), 2);
        assert_eq!(gpu.live(ObjectKind::CommandAllocator), 0);
        assert_eq!(gpu.live(ObjectKind::Fence), 0);
    }

    #[test]
    fn test_slots_release_last_to_first() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let frames = FrameResources::<MockGpu>::initialize(&device).unwrap();

        let mut expected: Vec<_> = gpu
            .acquisition_order()
            .into_iter()
            .filter(|&(kind, _)| matches!(kind, ObjectKind::CommandAllocator | ObjectKind::Fence))
            .collect();
        expected.reverse();

        let released_before = gpu.release_order().len();
        drop(frames);
        let released: Vec<_> = gpu.release_order().split_off(released_before);

        assert_eq!(released, expected);
    }
}
