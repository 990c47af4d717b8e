//! GPU 同步机制模块
//!
//! 提供帧槽使用的栅栏值类型，以及带超时的栅栏等待。
//!
//! # 使用场景
//!
//! 1. **帧同步**：复用某个帧槽之前，确保 GPU 已完成该槽上一次提交的工作
//! 2. **关闭**：释放资源之前等待 GPU 空闲

use std::time::Duration;

use tracing::debug;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::{Backend, Fence, WaitEvent};
use crate::gfx::types::WaitStatus;

/// Fence 值
///
/// 用于CPU-GPU同步的单调递增值。
/// CPU可以等待GPU完成特定Fence值对应的工作。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 创建新的Fence值
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }

    /// 递增Fence值
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

/// 等待栅栏达到 `value`
///
/// 已完成时立即返回；否则设置事件并阻塞，最多等待 `timeout`。
///
/// # 返回值
///
/// - 超时返回 `GraphicsError::Timeout`
/// - 设置事件或等待本身失败返回 `GraphicsError::DeviceLost`
pub fn wait_for_fence<B: Backend>(
    fence: &B::Fence,
    event: &B::Event,
    value: FenceValue,
    slot: usize,
    timeout: Duration,
) -> Result<()> {
    let completed = fence.completed_value();
    if completed >= value.value() {
        return Ok(());
    }

    debug!(slot, completed, expected = value.value(), "Waiting for GPU");

    fence
        .set_event_on_completion(value.value(), event)
        .map_err(GraphicsError::device_lost("SetEventOnCompletion"))?;

    match event.wait(timeout).map_err(GraphicsError::device_lost("WaitForSingleObject"))? {
        WaitStatus::Signaled => Ok(()),
        WaitStatus::TimedOut => Err(GraphicsError::Timeout {
            slot,
            fence_value: value.value(),
            timeout,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DistFrameError;
    use crate::gfx::api::{CommandQueue, Device, Factory};
    use crate::gfx::mock::{FenceMode, MockCall, MockGpu, MockOp};
    use crate::gfx::types::{CommandListType, FeatureLevel};

    #[test]
    fn test_fence_value() {
        let mut fence = FenceValue::new(0);
        assert_eq!(fence.value(), 0);

        fence.increment();
        assert_eq!(fence.value(), 1);

        fence.increment();
        assert_eq!(fence.value(), 2);
    }

    #[test]
    fn test_fence_ordering() {
        let f1 = FenceValue::new(1);
        let f2 = FenceValue::new(2);
        let f3 = FenceValue::new(1);

        assert!(f1 < f2);
        assert!(f2 > f1);
        assert_eq!(f1, f3);
    }

    fn setup(gpu: &MockGpu) -> (<MockGpu as Backend>::Device, <MockGpu as Backend>::CommandQueue) {
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        let device = gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap();
        let queue = device.create_command_queue(CommandListType::Direct).unwrap();
        (device, queue)
    }

    #[test]
    fn test_completed_fence_does_not_wait() {
        let gpu = MockGpu::new();
        let (device, queue) = setup(&gpu);
        let fence = device.create_fence(0).unwrap();
        let event = gpu.create_event().unwrap();

        queue.signal(&fence, 1).unwrap();
        wait_for_fence::<MockGpu>(&fence, &event, FenceValue::new(1), 0, Duration::from_secs(1)).unwrap();

        assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Wait { .. })), 0);
    }

    #[test]
    fn test_hung_gpu_times_out() {
        let gpu = MockGpu::new();
        gpu.set_fence_mode(FenceMode::Hung);
        let (device, queue) = setup(&gpu);
        let fence = device.create_fence(0).unwrap();
        let event = gpu.create_event().unwrap();

        queue.signal(&fence, 1).unwrap();
        let err = wait_for_fence::<MockGpu>(&fence, &event, FenceValue::new(1), 1, Duration::from_millis(5))
            .unwrap_err();

        assert!(matches!(
            err,
            DistFrameError::Graphics(GraphicsError::Timeout { slot: 1, fence_value: 1, .. })
        ));
    }

    #[test]
    fn test_wait_failure_is_device_lost() {
        let gpu = MockGpu::new();
        gpu.set_fence_mode(FenceMode::Delayed);
        gpu.fail_operation(MockOp::Wait);
        let (device, queue) = setup(&gpu);
        let fence = device.create_fence(0).unwrap();
        let event = gpu.create_event().unwrap();

        queue.signal(&fence, 1).unwrap();
        let err = wait_for_fence::<MockGpu>(&fence, &event, FenceValue::new(1), 0, Duration::from_secs(1))
            .unwrap_err();

        assert!(matches!(err, DistFrameError::Graphics(GraphicsError::DeviceLost { .. })));
    }
}
