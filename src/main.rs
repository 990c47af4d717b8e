//! DistFrame 演示程序
//!
//! 打开一个窗口，绑定到图形上下文，然后每帧上传一个三角形并清屏呈现。
//! Windows 上使用 DirectX 12 后端，其他平台使用模拟 GPU。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 使用 WARP 软件适配器并关闭调试层
//! cargo run -- --warp --no-debug-layer
//! ```

use anyhow::Context;
use tracing::{debug, error, info};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::raw_window_handle::HasWindowHandle;
use winit::window::WindowBuilder;

use dist_frame::core::{log, Config};
use dist_frame::gfx::types::SurfaceHandle;
use dist_frame::gfx::Backend;
use dist_frame::renderer::Graphics;

/// 每个顶点：位置 (x, y)、纹理坐标 (u, v)、颜色 (r, g, b, a)
const TRIANGLE_VERTICES: [f32; 24] = [
    -0.5, -0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0,
    0.0, 0.5, 0.5, 0.0, 0.0, 1.0, 0.0, 1.0,
    0.5, -0.5, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0,
];
const TRIANGLE_INDICES: [u16; 3] = [0, 1, 2];

/// 应用程序入口点
///
/// # 初始化流程
///
/// 1. 加载配置文件（config.toml）并应用命令行参数
/// 2. 验证配置并初始化日志系统
/// 3. 创建事件循环和窗口
/// 4. 初始化图形上下文并绑定窗口
/// 5. 启动主循环
fn main() -> anyhow::Result<()> {
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args());
    config.validate()?;

    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file)?;

    info!(version = env!("CARGO_PKG_VERSION"), "DistFrame starting");
    info!(
        width = config.window.width,
        height = config.window.height,
        warp = config.graphics.prefer_software_adapter,
        debug_layer = config.graphics.debug_layer,
        "Graphics configuration"
    );

    #[cfg(target_os = "windows")]
    let backend = dist_frame::gfx::Dx12;
    #[cfg(not(target_os = "windows"))]
    let backend = dist_frame::gfx::MockGpu::new();

    run(backend, config)
}

fn run<B: Backend + 'static>(backend: B, config: Config) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .with_resizable(false)
        .build(&event_loop)
        .context("Failed to create window")?;

    let mut graphics = Graphics::initialize(backend, &config.graphics)?;
    info!(backend = graphics.backend_name(), "Graphics context ready");

    let raw_handle = window.window_handle().context("Failed to get window handle")?.as_raw();
    match SurfaceHandle::try_from(raw_handle) {
        Ok(surface) => graphics.bind_surface(surface),
        // 非 Win32 窗口无法创建交换链，以无窗口模式运行
        Err(e) => debug!(error = %e, "Running headless"),
    }

    let mut graphics = Some(graphics);
    info!("Entering main loop...");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event: WindowEvent::CloseRequested, .. } => {
            info!("Close requested, shutting down");
            if let Some(graphics) = graphics.take() {
                if let Err(e) = graphics.shutdown() {
                    error!(error = %e, "Shutdown failed");
                }
            }
            elwt.exit();
        }
        Event::WindowEvent { event: WindowEvent::RedrawRequested, .. } => {
            let Some(gfx) = graphics.as_mut() else {
                return;
            };
            let size = window.inner_size();
            if let Err(e) = render_frame(gfx, size.width, size.height) {
                error!(error = %e, "Frame failed");
                if e.is_fatal() {
                    graphics = None;
                    elwt.exit();
                }
            }
        }
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}

fn render_frame<B: Backend>(gfx: &mut Graphics<B>, width: u32, height: u32) -> dist_frame::core::Result<()> {
    gfx.begin_frame(width, height)?;
    gfx.upload_mesh(&TRIANGLE_VERTICES, &TRIANGLE_INDICES)?;
    gfx.end_frame()
}
