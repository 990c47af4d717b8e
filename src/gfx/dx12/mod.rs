//! DirectX 12 图形 API 实现模块
//!
//! 基于 `windows` crate，为 `gfx::api` 中的每个 trait 提供实现。
//! 原生对象直接使用 COM 接口类型，引用计数由 `windows` crate 管理。
//!
//! # 模块组织
//!
//! - `backend`：`Dx12` 入口（调试层、工厂、适配器、设备、事件）
//! - `context`：设备、命令队列、命令分配器、栅栏、等待事件
//! - `command`：图形命令列表和资源屏障
//! - `descriptor`：描述符堆
//! - `resource`：上传缓冲区和交换链

mod backend;
mod command;
mod context;
mod descriptor;
mod resource;

pub use backend::Dx12;
pub use context::FenceEvent;
