//! 图形后端模块
//!
//! 本模块封装了原生图形 API 的绑定层：
//! - `api`：每种原生对象对应一个 trait，`Backend` 把它们组合到一起
//! - `types`：与 D3D12 / DXGI 结构体对应的纯数据类型
//! - `dx12`：基于 `windows` crate 的 DirectX 12 实现（仅 Windows）
//! - `mock`：可在任意平台运行的模拟 GPU
//!
//! 帧核心（`renderer`）对后端是泛型的，因此两个实现可以互换。

pub mod api;
pub mod types;
pub mod mock;
#[cfg(target_os = "windows")]
pub mod dx12;

pub use api::{ApiError, ApiResult, Backend};
pub use mock::MockGpu;
#[cfg(target_os = "windows")]
pub use dx12::Dx12;
