//! 错误处理模块
//!
//! 定义了帧核心中使用的统一错误类型，使用 `thiserror` 提供友好的错误消息。
//!
//! # 设计原则
//!
//! - 每个原生调用失败都带上操作名（如 `"CreateFence"`、`"Present"`）
//! - 初始化失败在返回前已经回滚了所有已获取的资源
//! - 帧内失败只中止当前帧，是否重试由调用方决定

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::gfx::api::ApiError;
use crate::gfx::types::FeatureLevel;

/// 帧核心统一的 Result 类型
pub type Result<T> = std::result::Result<T, DistFrameError>;

/// DistFrame 的错误类型
#[derive(Debug, Error)]
pub enum DistFrameError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 图形 API 错误
    #[error("Graphics error: {0}")]
    Graphics(#[from] GraphicsError),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 日志系统错误
    #[error("Log error: {0}")]
    Log(String),
}

/// 配置相关的错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件未找到
    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// 配置值无效
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// 设备、队列、分配器、栅栏、命令列表、交换链等创建失败
    #[error("Initialization failed in {op}: {source}")]
    Initialization {
        op: &'static str,
        #[source]
        source: ApiError,
    },

    /// 没有满足最低特性级别的适配器
    #[error("No adapter supports Direct3D 12 at {min_feature_level}")]
    NoSupportedAdapter { min_feature_level: FeatureLevel },

    /// 尚未绑定窗口句柄
    #[error("The window handle is not bound yet")]
    SurfaceNotBound,

    /// 设备丢失（Present 失败或栅栏等待失败）
    #[error("Device lost in {op}: {source}")]
    DeviceLost {
        op: &'static str,
        #[source]
        source: ApiError,
    },

    /// 等待 GPU 超时
    #[error("GPU did not reach fence value {fence_value} of slot {slot} within {timeout:?}")]
    Timeout {
        slot: usize,
        fence_value: u64,
        timeout: Duration,
    },

    /// 帧内命令执行失败
    #[error("{op} failed: {source}")]
    Command {
        op: &'static str,
        #[source]
        source: ApiError,
    },

    /// 上传缓冲区映射失败
    #[error("Mapping failed in {op}: {source}")]
    Mapping {
        op: &'static str,
        #[source]
        source: ApiError,
    },

    /// 上传数据超出缓冲区容量
    #[error("{buffer} upload of {requested} bytes exceeds capacity of {capacity} bytes")]
    CapacityExceeded {
        buffer: &'static str,
        requested: usize,
        capacity: usize,
    },

    /// 帧状态机调用顺序错误
    #[error("Cannot {operation} while frame is {state}")]
    InvalidFrameState {
        operation: &'static str,
        state: &'static str,
    },

    /// 命令列表状态错误
    #[error("Cannot {operation} while command list is {state}")]
    InvalidCommandListState {
        operation: &'static str,
        state: &'static str,
    },
}

impl GraphicsError {
    /// 包装初始化阶段的原生调用失败
    pub fn init(op: &'static str) -> impl FnOnce(ApiError) -> DistFrameError {
        move |source| GraphicsError::Initialization { op, source }.into()
    }

    /// 包装帧内的原生调用失败
    pub fn command(op: &'static str) -> impl FnOnce(ApiError) -> DistFrameError {
        move |source| GraphicsError::Command { op, source }.into()
    }

    /// 包装映射失败
    pub fn mapping(op: &'static str) -> impl FnOnce(ApiError) -> DistFrameError {
        move |source| GraphicsError::Mapping { op, source }.into()
    }

    /// 包装设备丢失
    pub fn device_lost(op: &'static str) -> impl FnOnce(ApiError) -> DistFrameError {
        move |source| GraphicsError::DeviceLost { op, source }.into()
    }
}

impl DistFrameError {
    /// 是否意味着后端已不可用，渲染循环应当停止
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DistFrameError::Graphics(
                GraphicsError::DeviceLost { .. }
                    | GraphicsError::Timeout { .. }
                    | GraphicsError::Initialization { .. }
                    | GraphicsError::NoSupportedAdapter { .. }
            )
        )
    }

    /// 取出图形错误（如果是）
    pub fn as_graphics(&self) -> Option<&GraphicsError> {
        match self {
            DistFrameError::Graphics(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_operation() {
        let err: DistFrameError = GraphicsError::init("CreateFence")(ApiError::new(-1, "boom"));
        let text = err.to_string();
        assert!(text.contains("CreateFence"), "{text}");
        assert!(text.contains("boom"), "{text}");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_surface_not_bound_is_not_fatal() {
        let err = DistFrameError::from(GraphicsError::SurfaceNotBound);
        assert!(!err.is_fatal());
        assert!(matches!(err.as_graphics(), Some(GraphicsError::SurfaceNotBound)));
    }
}
