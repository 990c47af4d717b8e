//! 帧控制器
//!
//! 每一帧按 `Idle → Recording → Submitted → Presented → Idle` 推进。
//!
//! # 开始一帧
//!
//! 1. 绑定了窗口时确保交换链存在
//! 2. 查询后缓冲区索引；没有交换链时使用槽 0 且不绑定渲染目标
//! 3. 重置该槽的命令分配器和命令列表
//! 4. 有渲染目标时：Present → RenderTarget 屏障、清屏、绑定渲染目标
//!
//! # 结束一帧
//!
//! 1. 有渲染目标时：RenderTarget → Present 屏障
//! 2. 关闭并提交命令列表
//! 3. 有渲染目标时：Present，递增该槽的栅栏值并 Signal，
//!    然后等待下一个槽上一次提交的工作完成
//!
//! 任何错误都会中止当前帧并回到 `Idle`，不做重试。

use tracing::{trace, warn};

use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::{Backend, CommandAllocator};
use crate::gfx::types::{ResourceState, FRAME_COUNT};

use super::sync::wait_for_fence;
use super::Graphics;

/// 清屏颜色
pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.25, 0.5, 1.0];

/// 帧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Recording,
    Submitted,
    Presented,
}

impl FrameState {
    pub fn name(&self) -> &'static str {
        match self {
            FrameState::Idle => "idle",
            FrameState::Recording => "recording",
            FrameState::Submitted => "submitted",
            FrameState::Presented => "presented",
        }
    }
}

impl<B: Backend> Graphics<B> {
    /// 开始一帧
    ///
    /// # 参数
    ///
    /// * `width`, `height` - 交换链尚未创建时使用的尺寸
    pub fn begin_frame(&mut self, width: u32, height: u32) -> Result<()> {
        self.expect_frame_state(FrameState::Idle, "begin a frame")?;

        let result = self.record_frame_start(width, height);
        if result.is_err() {
            self.abort_frame();
        }
        result
    }

    /// 结束一帧：提交、呈现并节流
    pub fn end_frame(&mut self) -> Result<()> {
        self.expect_frame_state(FrameState::Recording, "end a frame")?;

        let result = self.submit_and_present();
        if result.is_err() {
            self.abort_frame();
        } else {
            self.frame_state = FrameState::Idle;
        }
        result
    }

    fn record_frame_start(&mut self, width: u32, height: u32) -> Result<()> {
        if self.surface.is_some() {
            self.ensure_swap_chain(width, height)?;
        }

        let frame_index = self.swap_chain.as_ref().map(|sc| sc.current_back_buffer_index());
        let slot = frame_index.unwrap_or(0);

        self.frames
            .slot(slot)
            .allocator()
            .reset()
            .map_err(GraphicsError::command("CommandAllocator::Reset"))?;
        self.command_list.reset(self.frames.slot(slot).allocator())?;

        self.frame_index = frame_index;
        self.frame_state = FrameState::Recording;

        if let (Some(index), Some(swap_chain)) = (frame_index, self.swap_chain.as_ref()) {
            let render_target = swap_chain.render_target(index);
            let rtv = swap_chain.rtv_handle(index);

            self.command_list
                .transition(render_target, ResourceState::Present, ResourceState::RenderTarget)?;
            self.command_list.clear_render_target(rtv, CLEAR_COLOR)?;
            self.command_list.set_render_target(rtv)?;
        }

        trace!(frame_index = ?frame_index, "Frame begun");
        Ok(())
    }

    fn submit_and_present(&mut self) -> Result<()> {
        let frame_index = self.frame_index;

        if let (Some(index), Some(swap_chain)) = (frame_index, self.swap_chain.as_ref()) {
            self.command_list.transition(
                swap_chain.render_target(index),
                ResourceState::RenderTarget,
                ResourceState::Present,
            )?;
        }

        self.command_list.close()?;
        self.queue.execute(&self.command_list)?;
        self.frame_state = FrameState::Submitted;

        let (Some(index), Some(swap_chain)) = (frame_index, self.swap_chain.as_ref()) else {
            trace!("Headless frame submitted");
            return Ok(());
        };

        swap_chain.present(self.config.sync_interval())?;
        self.frame_state = FrameState::Presented;

        let slot = self.frames.slot_mut(index);
        let fence_value = slot.advance();
        self.queue.signal(slot.fence(), fence_value.value())?;

        trace!(frame_index = index, fence_value = fence_value.value(), "Frame presented");

        // 等待下一个槽上一次提交的工作完成，之后才能重置它的分配器
        let next = (index + 1) % FRAME_COUNT;
        let next_slot = self.frames.slot(next);
        wait_for_fence::<B>(
            next_slot.fence(),
            &self.event,
            next_slot.fence_value(),
            next,
            self.config.gpu_wait_timeout(),
        )
    }

    pub(super) fn abort_frame(&mut self) {
        if self.frame_state != FrameState::Idle {
            warn!(state = self.frame_state.name(), "Frame aborted");
        }
        self.command_list.abandon();
        self.frame_state = FrameState::Idle;
    }

    fn expect_frame_state(&self, required: FrameState, operation: &'static str) -> Result<()> {
        if self.frame_state != required {
            return Err(GraphicsError::InvalidFrameState {
                operation,
                state: self.frame_state.name(),
            }
            .into());
        }
        Ok(())
    }
}
