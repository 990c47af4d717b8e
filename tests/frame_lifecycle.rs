//! 帧生命周期的端到端测试
//!
//! 只通过公开接口驱动 `Graphics`，用模拟 GPU 观察后端调用。

use dist_frame::core::{DistFrameError, GraphicsConfig, GraphicsError};
use dist_frame::gfx::mock::{AdapterProfile, FenceMode, MockCall, MockGpu, MockOp, ObjectKind};
use dist_frame::gfx::types::{ResourceState, SurfaceHandle};
use dist_frame::renderer::{FrameState, Graphics};

fn bound_graphics(gpu: &MockGpu) -> Graphics<MockGpu> {
    let mut gfx = Graphics::initialize(gpu.clone(), &GraphicsConfig::default()).unwrap();
    gfx.bind_surface(SurfaceHandle::from_raw(0x1234).unwrap());
    gfx
}

fn run_frame(gfx: &mut Graphics<MockGpu>) -> dist_frame::Result<()> {
    gfx.begin_frame(800, 600)?;
    gfx.end_frame()
}

#[test]
fn test_back_buffers_rotate() {
    let gpu = MockGpu::new();
    let mut gfx = bound_graphics(&gpu);

    let mut indices = Vec::new();
    for _ in 0..5 {
        gfx.begin_frame(800, 600).unwrap();
        indices.push(gfx.frame_index().unwrap());
        gfx.end_frame().unwrap();
    }

    assert_eq!(indices, vec![0, 1, 0, 1, 0]);

    let presented: Vec<u32> = gpu
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::Present { back_buffer, .. } => Some(back_buffer),
            _ => None,
        })
        .collect();
    assert_eq!(presented, vec![0, 1, 0, 1, 0]);
}

#[test]
fn test_two_frames_fence_and_barriers() {
    let gpu = MockGpu::new();
    let mut gfx = bound_graphics(&gpu);

    run_frame(&mut gfx).unwrap();
    run_frame(&mut gfx).unwrap();

    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Present { .. })), 2);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Barrier { .. })), 4);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::CreateSwapChain { .. })), 1);
    assert_eq!(gfx.fence_value(0), 1);
    assert_eq!(gfx.fence_value(1), 1);

    // 每帧的两个屏障方向相反
    let barriers: Vec<(ResourceState, ResourceState)> = gpu
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::Barrier { before, after, .. } => Some((before, after)),
            _ => None,
        })
        .collect();
    assert_eq!(barriers[0], (ResourceState::Present, ResourceState::RenderTarget));
    assert_eq!(barriers[1], (ResourceState::RenderTarget, ResourceState::Present));
}

#[test]
fn test_allocator_never_reset_while_in_flight() {
    let gpu = MockGpu::new();
    gpu.set_fence_mode(FenceMode::Delayed);
    let mut gfx = bound_graphics(&gpu);

    for _ in 0..6 {
        run_frame(&mut gfx).unwrap();
    }

    assert_eq!(gpu.allocator_violations(), 0);

    // 第三帧复用槽 0，重置之前必须先等到它的栅栏
    let calls = gpu.calls();
    let resets: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, MockCall::ResetAllocator { .. }))
        .map(|(i, _)| i)
        .collect();
    let first_wait = calls
        .iter()
        .position(|c| matches!(c, MockCall::Wait { .. }))
        .unwrap();
    assert!(first_wait < resets[2]);
}

#[test]
fn test_headless_frames_do_not_present() {
    let gpu = MockGpu::new();
    let mut gfx = Graphics::initialize(gpu.clone(), &GraphicsConfig::default()).unwrap();

    gfx.begin_frame(800, 600).unwrap();
    assert_eq!(gfx.frame_index(), None);
    gfx.end_frame().unwrap();
    run_frame(&mut gfx).unwrap();

    assert!(!gfx.has_swap_chain());
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::ExecuteCommandLists { .. })), 2);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Present { .. })), 0);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Barrier { .. })), 0);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::ClearRenderTarget { .. })), 0);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::SetRenderTargets { .. })), 0);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Signal { .. })), 0);
}

#[test]
fn test_adapter_selection_skips_software() {
    let gpu = MockGpu::with_adapters(vec![
        AdapterProfile::software("Microsoft Basic Render Driver"),
        AdapterProfile::hardware("Discrete GPU"),
    ]);

    let gfx = Graphics::initialize(gpu.clone(), &GraphicsConfig::default()).unwrap();

    assert!(gpu
        .calls()
        .contains(&MockCall::CreateDevice { adapter: "Discrete GPU".to_string() }));
    assert_eq!(gpu.created(ObjectKind::Adapter), 2);
    assert_eq!(gpu.live(ObjectKind::Adapter), 0);
    drop(gfx);
}

#[test]
fn test_partial_initialization_rolls_back() {
    let gpu = MockGpu::new();
    // 第二个帧槽的栅栏创建失败
    gpu.fail_creation(ObjectKind::Fence, 2);

    let err = Graphics::initialize(gpu.clone(), &GraphicsConfig::default()).err().unwrap();

    assert!(matches!(
        err,
        DistFrameError::Graphics(GraphicsError::Initialization { op: "CreateFence", .. })
    ));
    for kind in [
        ObjectKind::DebugLayer,
        ObjectKind::Factory,
        ObjectKind::Adapter,
        ObjectKind::Device,
        ObjectKind::CommandQueue,
        ObjectKind::CommandAllocator,
        ObjectKind::Fence,
    ] {
        assert_eq!(gpu.live(kind), 0, "{kind:?} leaked");
    }
    assert_eq!(gpu.created(ObjectKind::CommandList), 0);
}

#[test]
fn test_hung_gpu_times_out() {
    let gpu = MockGpu::new();
    gpu.set_fence_mode(FenceMode::Hung);
    let config = GraphicsConfig { gpu_wait_timeout_ms: 5, ..GraphicsConfig::default() };
    let mut gfx = Graphics::initialize(gpu.clone(), &config).unwrap();
    gfx.bind_surface(SurfaceHandle::from_raw(0x1234).unwrap());

    run_frame(&mut gfx).unwrap();
    let err = run_frame(&mut gfx).unwrap_err();

    assert!(matches!(
        err,
        DistFrameError::Graphics(GraphicsError::Timeout { slot: 0, fence_value: 1, .. })
    ));
    assert!(err.is_fatal());
    assert_eq!(gfx.frame_state(), FrameState::Idle);
}

#[test]
fn test_present_failure_is_device_lost() {
    let gpu = MockGpu::new();
    let mut gfx = bound_graphics(&gpu);
    gpu.fail_operation(MockOp::Present);

    gfx.begin_frame(800, 600).unwrap();
    let err = gfx.end_frame().unwrap_err();

    assert!(matches!(
        err,
        DistFrameError::Graphics(GraphicsError::DeviceLost { op: "Present", .. })
    ));
    assert_eq!(gfx.frame_state(), FrameState::Idle);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Signal { .. })), 0);
}

#[test]
fn test_upload_mesh_views() {
    let gpu = MockGpu::new();
    let mut gfx = Graphics::initialize(gpu.clone(), &GraphicsConfig::default()).unwrap();

    let vertices = [0.5f32; 24];
    gfx.upload_mesh(&vertices, &[0, 1, 2]).unwrap();

    let vertex_view = gfx.vertex_buffer_view();
    let index_view = gfx.index_buffer_view();
    assert_eq!(vertex_view.size_in_bytes, 96);
    assert_eq!(vertex_view.stride_in_bytes, 32);
    assert_eq!(index_view.size_in_bytes, 6);

    let bytes = gpu.buffer_bytes(index_view.buffer_location).unwrap();
    assert_eq!(&bytes[..6], &[0, 0, 1, 0, 2, 0]);

    // 较短的上传只缩小视图，缓冲区地址不变
    gfx.upload_mesh(&vertices[..8], &[0]).unwrap();
    assert_eq!(gfx.vertex_buffer_view().size_in_bytes, 32);
    assert_eq!(gfx.index_buffer_view().size_in_bytes, 2);
    assert_eq!(gfx.vertex_buffer_view().buffer_location, vertex_view.buffer_location);
}

#[test]
fn test_upload_mesh_over_capacity() {
    let gpu = MockGpu::new();
    let config = GraphicsConfig { max_indices: 3, ..GraphicsConfig::default() };
    let mut gfx = Graphics::initialize(gpu.clone(), &config).unwrap();

    let err = gfx.upload_mesh(&[0.0; 24], &[0, 1, 2, 0]).unwrap_err();

    assert!(matches!(
        err,
        DistFrameError::Graphics(GraphicsError::CapacityExceeded { buffer: "index", requested: 8, capacity: 6 })
    ));
    // 顶点缓冲区同样没有被写入
    assert_eq!(gfx.vertex_buffer_view().size_in_bytes, 0);
    assert_eq!(gpu.count_calls(|c| matches!(c, MockCall::Map { .. })), 0);
}

#[test]
fn test_shutdown_releases_in_reverse_order() {
    let gpu = MockGpu::new();
    let mut gfx = bound_graphics(&gpu);
    run_frame(&mut gfx).unwrap();
    run_frame(&mut gfx).unwrap();

    gfx.shutdown().unwrap();

    let mut expected: Vec<(ObjectKind, u64)> = gpu
        .acquisition_order()
        .into_iter()
        .filter(|&(kind, _)| kind != ObjectKind::Adapter)
        .collect();
    expected.reverse();
    let released: Vec<(ObjectKind, u64)> = gpu
        .release_order()
        .into_iter()
        .filter(|&(kind, _)| kind != ObjectKind::Adapter)
        .collect();

    assert_eq!(released, expected);
    assert_eq!(gpu.live(ObjectKind::Device), 0);
    assert_eq!(gpu.live(ObjectKind::SwapChain), 0);
}

#[test]
fn test_shutdown_mid_frame() {
    let gpu = MockGpu::new();
    let mut gfx = bound_graphics(&gpu);
    gfx.begin_frame(800, 600).unwrap();

    gfx.shutdown().unwrap();

    assert_eq!(gpu.live(ObjectKind::CommandList), 0);
    assert_eq!(gpu.live(ObjectKind::Resource), 0);
}
