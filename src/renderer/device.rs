//! 适配器与设备选择
//!
//! # 初始化流程
//!
//! 1. 启用调试层（配置要求时；失败即初始化失败）
//! 2. 创建 DXGI 工厂
//! 3. 选择适配器：直接使用 WARP，或从 0 开始枚举，跳过软件适配器，
//!    选中第一个能通过最低特性级别能力探测的适配器
//! 4. 在选中的适配器上创建设备，然后释放适配器

use tracing::{debug, info, warn};

use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::{Adapter, Backend, Factory};
use crate::gfx::types::FeatureLevel;

/// 设备选择的结果
///
/// 字段按获取顺序的逆序声明，析构时先释放设备，最后释放调试层。
pub struct SelectedDevice<B: Backend> {
    pub device: B::Device,
    pub factory: B::Factory,
    pub debug_layer: Option<B::DebugLayer>,
}

/// 选择适配器并创建设备
///
/// # 参数
///
/// * `backend` - 图形后端
/// * `prefer_software` - 为 true 时直接使用 WARP 适配器
/// * `debug_layer` - 是否启用调试层
///
/// # 返回值
///
/// 没有适配器支持最低特性级别时返回 `GraphicsError::NoSupportedAdapter`
pub fn select_adapter_and_device<B: Backend>(
    backend: &B,
    prefer_software: bool,
    debug_layer: bool,
) -> Result<SelectedDevice<B>> {
    let debug_layer = if debug_layer {
        Some(backend.enable_debug_layer().map_err(GraphicsError::init("D3D12GetDebugInterface"))?)
    } else {
        None
    };

    let factory = backend
        .create_factory(debug_layer.is_some())
        .map_err(GraphicsError::init("CreateDXGIFactory2"))?;

    let adapter = if prefer_software {
        info!("Using WARP adapter");
        factory.enum_warp_adapter().map_err(GraphicsError::init("EnumWarpAdapter"))?
    } else {
        find_hardware_adapter(backend, &factory)?.ok_or(GraphicsError::NoSupportedAdapter {
            min_feature_level: FeatureLevel::MINIMUM,
        })?
    };

    let desc = adapter.desc().map_err(GraphicsError::init("GetDesc1"))?;
    info!(
        adapter = %desc.description,
        vendor_id = desc.vendor_id,
        device_id = desc.device_id,
        video_memory_mb = desc.dedicated_video_memory >> 20,
        "Adapter selected"
    );

    let device = backend
        .create_device(&adapter, FeatureLevel::MINIMUM)
        .map_err(GraphicsError::init("D3D12CreateDevice"))?;
    drop(adapter);

    debug!(backend = backend.name(), "D3D12 device created");

    Ok(SelectedDevice { device, factory, debug_layer })
}

/// 枚举硬件适配器，返回第一个支持最低特性级别的
fn find_hardware_adapter<B: Backend>(backend: &B, factory: &B::Factory) -> Result<Option<B::Adapter>> {
    let mut index = 0;
    while let Some(adapter) = factory
        .enum_adapter(index)
        .map_err(GraphicsError::init("EnumAdapters1"))?
    {
        index += 1;

        let desc = adapter.desc().map_err(GraphicsError::init("GetDesc1"))?;
        if desc.software {
            debug!(adapter = %desc.description, "Skipping software adapter");
            continue;
        }

        match backend.probe_device(&adapter, FeatureLevel::MINIMUM) {
            Ok(()) => return Ok(Some(adapter)),
            Err(e) => {
                warn!(adapter = %desc.description, error = %e, "Adapter does not support Direct3D 12");
            }
        }
    }

    Ok(None)
}
