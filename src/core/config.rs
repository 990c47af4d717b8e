//! 配置管理模块
//!
//! 提供帧核心配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "DistFrame"
//!
//! [graphics]
//! prefer_software_adapter = false  # true 时直接使用 WARP
//! debug_layer = true
//! max_indices = 65535
//! vertex_float_count = 8
//! gpu_wait_timeout_ms = 10000
//! vsync = true
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{ConfigError, Result};

/// 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置（仅演示程序使用）
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 直接使用软件（WARP）适配器
    #[serde(default)]
    pub prefer_software_adapter: bool,

    /// 启用 D3D12 调试层；启用后调试层不可用视为初始化失败
    #[serde(default = "default_debug_layer")]
    pub debug_layer: bool,

    /// 每帧最大索引数，同时作为最大顶点数
    #[serde(default = "default_max_indices")]
    pub max_indices: u32,

    /// 每个顶点包含的 f32 数量
    #[serde(default = "default_vertex_float_count")]
    pub vertex_float_count: u32,

    /// 等待 GPU 的超时时间（毫秒）
    #[serde(default = "default_gpu_wait_timeout_ms")]
    pub gpu_wait_timeout_ms: u64,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "DistFrame".to_string() }
fn default_debug_layer() -> bool { true }
fn default_max_indices() -> u32 { (1 << 16) / 3 * 3 }
fn default_vertex_float_count() -> u32 { 8 }
fn default_gpu_wait_timeout_ms() -> u64 { 10 * 1000 }
fn default_vsync() -> bool { true }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_file() -> String { "distframe.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            prefer_software_adapter: false,
            debug_layer: default_debug_layer(),
            max_indices: default_max_indices(),
            vertex_float_count: default_vertex_float_count(),
            gpu_wait_timeout_ms: default_gpu_wait_timeout_ms(),
            vsync: default_vsync(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_file: default_log_file(),
        }
    }
}

impl GraphicsConfig {
    /// 单个顶点的字节跨度
    pub fn vertex_stride(&self) -> usize {
        self.vertex_float_count as usize * std::mem::size_of::<f32>()
    }

    /// 顶点上传缓冲区容量（字节）
    pub fn vertex_buffer_capacity(&self) -> usize {
        self.max_indices as usize * self.vertex_stride()
    }

    /// 索引上传缓冲区容量（字节）
    pub fn index_buffer_capacity(&self) -> usize {
        self.max_indices as usize * std::mem::size_of::<u16>()
    }

    /// 等待 GPU 的超时时间
    pub fn gpu_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.gpu_wait_timeout_ms)
    }

    /// Present 的同步间隔
    pub fn sync_interval(&self) -> u32 {
        if self.vsync { 1 } else { 0 }
    }

    /// 验证图形配置
    pub fn validate(&self) -> Result<()> {
        if self.max_indices == 0 || self.max_indices > u16::MAX as u32 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.max_indices".to_string(),
                reason: "must be in 1..=65535 so every index fits in u16".to_string(),
            }.into());
        }

        if self.vertex_float_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.vertex_float_count".to_string(),
                reason: "a vertex needs at least one float".to_string(),
            }.into());
        }

        // 缓冲区视图的大小和跨度都是 u32
        if self.vertex_buffer_capacity() > u32::MAX as usize {
            return Err(ConfigError::InvalidValue {
                field: "graphics.vertex_float_count".to_string(),
                reason: "max_indices * vertex stride must fit in u32".to_string(),
            }.into());
        }

        if self.gpu_wait_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.gpu_wait_timeout_ms".to_string(),
                reason: "timeout must be greater than 0".to_string(),
            }.into());
        }

        Ok(())
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use dist_frame::core::Config;
    ///
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_path_buf()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--warp`: 使用软件适配器
    /// - `--no-debug-layer`: 关闭 D3D12 调试层
    /// - `--width <value>`: 设置窗口宽度
    /// - `--height <value>`: 设置窗口高度
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--warp") {
            self.graphics.prefer_software_adapter = true;
        }

        if args.iter().any(|a| a == "--no-debug-layer") {
            self.graphics.debug_layer = false;
        }

        if let Some(width) = value_after(&args, "--width") {
            self.window.width = width;
        }

        if let Some(height) = value_after(&args, "--height") {
            self.window.height = height;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        self.graphics.validate()
    }
}

fn value_after(args: &[String], flag: &str) -> Option<u32> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1)?.parse().ok()
}
