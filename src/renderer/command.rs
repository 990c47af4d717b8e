//! 命令列表与命令队列
//!
//! 在原生命令列表外面加一层状态跟踪，让调用顺序错误在 CPU 侧就被发现，
//! 而不是交给驱动报错。
//!
//! # 命令列表状态
//!
//! - `Closed`：可以重置，也可以提交
//! - `Recording`：可以记录命令，必须关闭后才能提交

use tracing::warn;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::{Backend, CommandQueue, Device, GraphicsCommandList};
use crate::gfx::types::{CommandListType, CpuDescriptorHandle, ResourceState, TransitionBarrier};

/// 命令列表状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListState {
    /// 已关闭（可重置、可提交）
    Closed,
    /// 正在记录
    Recording,
}

impl CommandListState {
    pub fn name(&self) -> &'static str {
        match self {
            CommandListState::Closed => "closed",
            CommandListState::Recording => "recording",
        }
    }
}

/// 可复用的图形命令列表
pub struct CommandList<B: Backend> {
    list: B::CommandList,
    state: CommandListState,
}

impl<B: Backend> CommandList<B> {
    /// 基于 `allocator` 创建命令列表
    ///
    /// 原生命令列表创建后处于记录状态，这里立即关闭，
    /// 使第一帧可以像之后的每一帧一样先重置再记录。
    pub fn create(device: &B::Device, allocator: &B::CommandAllocator) -> Result<Self> {
        let list = device
            .create_command_list(CommandListType::Direct, allocator)
            .map_err(GraphicsError::init("CreateCommandList"))?;
        list.close().map_err(GraphicsError::init("CommandList::Close"))?;

        Ok(Self { list, state: CommandListState::Closed })
    }

    /// 当前状态
    pub fn state(&self) -> CommandListState {
        self.state
    }

    /// 重置并开始记录，不设置初始管线状态
    pub fn reset(&mut self, allocator: &B::CommandAllocator) -> Result<()> {
        self.expect(CommandListState::Closed, "reset")?;
        self.list.reset(allocator).map_err(GraphicsError::command("CommandList::Reset"))?;
        self.state = CommandListState::Recording;
        Ok(())
    }

    /// 结束记录
    pub fn close(&mut self) -> Result<()> {
        self.expect(CommandListState::Recording, "close")?;
        let result = self.list.close().map_err(GraphicsError::command("CommandList::Close"));
        // 关闭失败后列表也不能再记录，只能重置
        self.state = CommandListState::Closed;
        result
    }

    /// 放弃正在记录的命令
    ///
    /// 帧出错中止时调用，使下一帧可以正常重置。
    pub fn abandon(&mut self) {
        if self.state == CommandListState::Recording {
            if let Err(e) = self.list.close() {
                warn!(error = %e, "Failed to close abandoned command list");
            }
            self.state = CommandListState::Closed;
        }
    }

    pub fn transition(&self, resource: &B::Resource, before: ResourceState, after: ResourceState) -> Result<()> {
        self.expect(CommandListState::Recording, "record a barrier")?;
        self.list.resource_barrier(&TransitionBarrier::new(resource, before, after));
        Ok(())
    }

    pub fn clear_render_target(&self, handle: CpuDescriptorHandle, color: [f32; 4]) -> Result<()> {
        self.expect(CommandListState::Recording, "clear a render target")?;
        self.list.clear_render_target_view(handle, color);
        Ok(())
    }

    pub fn set_render_target(&self, handle: CpuDescriptorHandle) -> Result<()> {
        self.expect(CommandListState::Recording, "bind a render target")?;
        self.list.om_set_render_targets(&[handle]);
        Ok(())
    }

    fn expect(&self, required: CommandListState, operation: &'static str) -> Result<()> {
        if self.state != required {
            return Err(GraphicsError::InvalidCommandListState {
                operation,
                state: self.state.name(),
            }
            .into());
        }
        Ok(())
    }
}

/// 直接命令队列
///
/// 提交按顺序执行。
pub struct Queue<B: Backend> {
    queue: B::CommandQueue,
}

impl<B: Backend> Queue<B> {
    pub fn create(device: &B::Device) -> Result<Self> {
        let queue = device
            .create_command_queue(CommandListType::Direct)
            .map_err(GraphicsError::init("CreateCommandQueue"))?;
        Ok(Self { queue })
    }

    /// 原生队列（创建交换链时需要）
    pub fn raw(&self) -> &B::CommandQueue {
        &self.queue
    }

    /// 提交一个已关闭的命令列表
    pub fn execute(&self, list: &CommandList<B>) -> Result<()> {
        list.expect(CommandListState::Closed, "submit")?;
        self.queue.execute_command_lists(&[&list.list]);
        Ok(())
    }

    /// GPU 执行到此处时把 `fence` 设置为 `value`
    pub fn signal(&self, fence: &B::Fence, value: u64) -> Result<()> {
        self.queue.signal(fence, value).map_err(GraphicsError::command("Signal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DistFrameError;
    use crate::gfx::api::Factory;
    use crate::gfx::mock::{MockCall, MockGpu};
    use crate::gfx::types::FeatureLevel;

    fn device(gpu: &MockGpu) -> <MockGpu as Backend>::Device {
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap()
    }

    #[test]
    fn test_command_list_state_machine() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        let mut list = CommandList::<MockGpu>::create(&device, &allocator).unwrap();

        assert_eq!(list.state(), CommandListState::Closed);
        assert!(list.close().is_err());

        list.reset(&allocator).unwrap();
        assert_eq!(list.state(), CommandListState::Recording);
        // 不能重复重置
        assert!(matches!(
            list.reset(&allocator),
            Err(DistFrameError::Graphics(GraphicsError::InvalidCommandListState { state: "recording", .. }))
        ));

        list.close().unwrap();
        assert_eq!(list.state(), CommandListState::Closed);
    }

    #[test]
    fn test_recording_requires_open_list() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        let list = CommandList::<MockGpu>::create(&device, &allocator).unwrap();

        assert!(list.clear_render_target(CpuDescriptorHandle::new(0), [0.0; 4]).is_err());
        assert!(list.set_render_target(CpuDescriptorHandle::new(0)).is_err());
        assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::ClearRenderTarget { .. })), 0);
    }

    #[test]
    fn test_queue_rejects_open_list() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let queue = Queue::<MockGpu>::create(&device).unwrap();
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        let mut list = CommandList::<MockGpu>::create(&device, &allocator).unwrap();

        list.reset(&allocator).unwrap();
        assert!(queue.execute(&list).is_err());

        list.close().unwrap();
        queue.execute(&list).unwrap();
        assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::ExecuteCommandLists { count: 1 })), 1);
    }

    #[test]
    fn test_abandon_closes_recording_list() {
        let gpu = MockGpu::new();
        let device = device(&gpu);
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        let mut list = CommandList::<MockGpu>::create(&device, &allocator).unwrap();

        list.reset(&allocator).unwrap();
        list.abandon();
        assert_eq!(list.state(), CommandListState::Closed);
        list.reset(&allocator).unwrap();
    }
}
