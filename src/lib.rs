//! DistFrame - Direct3D 12 设备与帧生命周期核心
//!
//! 本库负责图形后端最底层的部分：选择适配器并创建设备、延迟创建交换链、
//! 双缓冲帧资源、开始 / 结束帧协议（资源屏障、提交、呈现、栅栏节流）
//! 以及上传堆上的临时顶点 / 索引缓冲区。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `gfx`: 原生图形 API 绑定层（DirectX 12 实现和模拟 GPU）
//! - `renderer`: 帧核心（`Graphics` 上下文及其组件）
//!
//! # 使用示例
//!
//! ```no_run
//! use dist_frame::core::GraphicsConfig;
//! use dist_frame::gfx::MockGpu;
//! use dist_frame::renderer::Graphics;
//!
//! let mut graphics = Graphics::initialize(MockGpu::new(), &GraphicsConfig::default())?;
//!
//! graphics.begin_frame(800, 600)?;
//! graphics.upload_mesh(&[0.0; 24], &[0, 1, 2])?;
//! graphics.end_frame()?;
//!
//! graphics.shutdown()?;
//! # Ok::<(), dist_frame::core::DistFrameError>(())
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;

pub use crate::core::{DistFrameError, GraphicsError, Result};
pub use crate::renderer::{FrameState, Graphics};
