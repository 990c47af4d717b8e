//! 交换链管理
//!
//! 交换链在第一次需要时才创建（绑定窗口之后的第一帧），创建后不再改变大小。
//! RTV 描述符 `i` 始终描述渲染目标 `i`。

use tracing::info;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::api::{Backend, DescriptorHeap, Device, Factory, SwapChain};
use crate::gfx::types::{CpuDescriptorHandle, DescriptorHeapType, SurfaceHandle, SwapChainDesc, FRAME_COUNT};

/// 交换链及其渲染目标
///
/// 字段按获取顺序的逆序声明：渲染目标、描述符堆、交换链。
/// 渲染目标从最后一个开始释放。
pub struct SwapChainTarget<B: Backend> {
    render_targets: Vec<B::Resource>,
    rtv_heap: B::DescriptorHeap,
    swap_chain: B::SwapChain,
    rtv_descriptor_size: u32,
    width: u32,
    height: u32,
}

impl<B: Backend> SwapChainTarget<B> {
    /// 为窗口创建交换链、RTV 描述符堆和每个缓冲区的渲染目标视图
    ///
    /// # 参数
    ///
    /// * `factory` - DXGI 工厂
    /// * `device` - 设备，用于创建描述符堆和 RTV
    /// * `queue` - 交换链绑定的命令队列
    /// * `surface` - 原生窗口句柄
    ///
    /// 任何一步失败都会释放本次创建的全部对象。
    pub fn create(
        factory: &B::Factory,
        device: &B::Device,
        queue: &B::CommandQueue,
        surface: SurfaceHandle,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let desc = SwapChainDesc::flip_discard(width, height);
        let swap_chain = factory
            .create_swap_chain(queue, surface, &desc)
            .map_err(GraphicsError::init("CreateSwapChainForHwnd"))?;

        let rtv_heap = device
            .create_descriptor_heap(DescriptorHeapType::RenderTargetView, FRAME_COUNT as u32)
            .map_err(GraphicsError::init("CreateDescriptorHeap"))?;
        let rtv_descriptor_size = device.descriptor_handle_increment_size(DescriptorHeapType::RenderTargetView);
        let heap_start = rtv_heap.cpu_handle_for_heap_start();

        let render_targets: [B::Resource; FRAME_COUNT] = array_init::try_array_init(|i| -> Result<B::Resource> {
            let buffer = swap_chain
                .get_buffer(i as u32)
                .map_err(GraphicsError::init("GetBuffer"))?;
            device.create_render_target_view(&buffer, heap_start.offset(i, rtv_descriptor_size));
            Ok(buffer)
        })?;

        info!(width, height, buffers = FRAME_COUNT, "Swap chain created");

        Ok(Self {
            render_targets: Vec::from(render_targets),
            rtv_heap,
            swap_chain,
            rtv_descriptor_size,
            width,
            height,
        })
    }

    /// 第 `index` 个渲染目标的 RTV 句柄
    pub fn rtv_handle(&self, index: usize) -> CpuDescriptorHandle {
        self.rtv_heap
            .cpu_handle_for_heap_start()
            .offset(index, self.rtv_descriptor_size)
    }

    pub fn render_target(&self, index: usize) -> &B::Resource {
        &self.render_targets[index]
    }

    pub fn current_back_buffer_index(&self) -> usize {
        self.swap_chain.current_back_buffer_index() as usize
    }

    /// Present 失败通常意味着设备已被移除
    pub fn present(&self, sync_interval: u32) -> Result<()> {
        self.swap_chain
            .present(sync_interval)
            .map_err(GraphicsError::device_lost("Present"))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl<B: Backend> Drop for SwapChainTarget<B> {
    fn drop(&mut self) {
        while let Some(render_target) = self.render_targets.pop() {
            drop(render_target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::mock::{MockCall, MockGpu, ObjectKind, RTV_DESCRIPTOR_SIZE};
    use crate::gfx::types::FeatureLevel;
    use crate::renderer::command::Queue;

    fn surface() -> SurfaceHandle {
        SurfaceHandle::from_raw(0x1234).unwrap()
    }

    #[test]
    fn test_rtv_handles_follow_stride() {
        let gpu = MockGpu::new();
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        let device = gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap();
        let queue = Queue::<MockGpu>::create(&device).unwrap();

        let target = SwapChainTarget::<MockGpu>::create(&factory, &device, queue.raw(), surface(), 800, 600).unwrap();

        let start = target.rtv_handle(0);
        assert_eq!(target.rtv_handle(1).ptr, start.ptr + RTV_DESCRIPTOR_SIZE as usize);
        assert_eq!(target.size(), (800, 600));
        assert_eq!(target.current_back_buffer_index(), 0);

        // RTV i 描述渲染目标 i
        for i in 0..FRAME_COUNT {
            let expected = MockCall::CreateRenderTargetView {
                resource: target.render_target(i).id(),
                handle: target.rtv_handle(i),
            };
            assert!(gpu.calls().contains(&expected));
        }
    }

    #[test]
    fn test_failed_buffer_fetch_releases_swap_chain() {
        let gpu = MockGpu::new();
        gpu.fail_creation(ObjectKind::Resource, 2);
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        let device = gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap();
        let queue = Queue::<MockGpu>::create(&device).unwrap();

        let result = SwapChainTarget::<MockGpu>::create(&factory, &device, queue.raw(), surface(), 800, 600);

        assert!(result.is_err());
        assert_eq!(gpu.live(ObjectKind::SwapChain), 0);
        assert_eq!(gpu.live(ObjectKind::DescriptorHeap), 0);
        assert_eq!(gpu.live(ObjectKind::Resource), 0);
    }

    #[test]
    fn test_release_order_is_reverse_of_creation() {
        let gpu = MockGpu::new();
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        let device = gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap();
        let queue = Queue::<MockGpu>::create(&device).unwrap();

        let acquired_before = gpu.acquisition_order().len();
        let target = SwapChainTarget::<MockGpu>::create(&factory, &device, queue.raw(), surface(), 800, 600).unwrap();
        let mut expected = gpu.acquisition_order().split_off(acquired_before);
        expected.reverse();

        let released_before = gpu.release_order().len();
        drop(target);
        let released = gpu.release_order().split_off(released_before);

        assert_eq!(released, expected);
        assert_eq!(released.first().map(|&(kind, _)| kind), Some(ObjectKind::Resource));
        assert_eq!(released.last().map(|&(kind, _)| kind), Some(ObjectKind::SwapChain));
    }
}
