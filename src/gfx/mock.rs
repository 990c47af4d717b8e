//! 模拟图形后端
//!
//! `MockGpu` 在任意平台上实现 `gfx::api` 的全部 trait，用于测试帧核心，
//! 也作为非 Windows 平台上演示程序的后端。
//!
//! # 功能
//!
//! - 记录每一次原生调用（`MockCall`）
//! - 按对象种类统计创建 / 释放次数，并记录获取与释放顺序
//! - 注入失败：第 N 次创建某种对象失败，或某个操作下一次调用失败
//! - 模拟 GPU 进度：立即完成、延迟到等待时完成、或永远不完成（挂起）
//! - 检查命令分配器在 GPU 仍在使用时被重置的情况
//! - 上传缓冲区的内容保存在内存中，可在测试中读取

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Range;
use std::ptr::NonNull;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use super::api::{
    Adapter, ApiError, ApiResult, Backend, CommandAllocator, CommandQueue, DescriptorHeap, Device,
    Factory, Fence, GraphicsCommandList, Resource, SwapChain, WaitEvent,
};
use super::types::{
    AdapterDesc, CommandListType, CpuDescriptorHandle, DescriptorHeapType, FeatureLevel,
    ResourceState, SurfaceHandle, SwapChainDesc, TransitionBarrier, WaitStatus,
};

/// RTV 描述符步长
pub const RTV_DESCRIPTOR_SIZE: u32 = 32;

const E_OUTOFMEMORY: i32 = 0x8007_000E_u32 as i32;
const DXGI_ERROR_UNSUPPORTED: i32 = 0x887A_0004_u32 as i32;
const DXGI_ERROR_DEVICE_REMOVED: i32 = 0x887A_0005_u32 as i32;

/// 原生对象种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    DebugLayer,
    Factory,
    Adapter,
    Device,
    CommandQueue,
    CommandAllocator,
    Fence,
    CommandList,
    DescriptorHeap,
    Resource,
    SwapChain,
    Event,
}

/// 可注入失败的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    EnumAdapter,
    AllocatorReset,
    CommandListReset,
    CommandListClose,
    Signal,
    SetEventOnCompletion,
    Wait,
    Present,
    Map,
}

/// GPU 进度模型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    /// Signal 后立即完成
    Immediate,
    /// 只有 CPU 等待时才完成
    Delayed,
    /// 永远不完成
    Hung,
}

/// 模拟适配器的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub description: String,
    pub software: bool,
    pub supports_d3d12: bool,
}

impl AdapterProfile {
    pub fn hardware(description: &str) -> Self {
        Self { description: description.to_string(), software: false, supports_d3d12: true }
    }

    pub fn software(description: &str) -> Self {
        Self { description: description.to_string(), software: true, supports_d3d12: true }
    }

    /// 硬件适配器，但不支持 Direct3D 12
    pub fn unsupported(description: &str) -> Self {
        Self { description: description.to_string(), software: false, supports_d3d12: false }
    }
}

/// 一次原生调用
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    EnableDebugLayer,
    CreateFactory { debug: bool },
    EnumAdapter { index: u32 },
    EnumWarpAdapter,
    ProbeDevice { adapter: String, level: FeatureLevel },
    CreateDevice { adapter: String },
    Create { kind: ObjectKind, id: u64 },
    CreateFailed { kind: ObjectKind, attempt: usize },
    CreateSwapChain { width: u32, height: u32, buffer_count: u32 },
    CreateRenderTargetView { resource: u64, handle: CpuDescriptorHandle },
    CreateUploadBuffer { size: u64 },
    ResetAllocator { allocator: u64 },
    ResetCommandList { allocator: u64 },
    CloseCommandList,
    Barrier { resource: u64, before: ResourceState, after: ResourceState },
    ClearRenderTarget { handle: CpuDescriptorHandle, color: [f32; 4] },
    SetRenderTargets { handles: Vec<CpuDescriptorHandle> },
    ExecuteCommandLists { count: usize },
    Signal { fence: u64, value: u64 },
    SetEventOnCompletion { fence: u64, value: u64 },
    Wait { fence: u64, value: u64, status: Option<WaitStatus> },
    Present { sync_interval: u32, back_buffer: u32 },
    Map { resource: u64 },
    Unmap { resource: u64 },
}

#[derive(Debug, Default, Clone, Copy)]
struct FenceState {
    completed: u64,
    signaled: u64,
}

struct MockState {
    calls: Vec<MockCall>,
    next_id: u64,
    attempts: HashMap<ObjectKind, usize>,
    created: HashMap<ObjectKind, usize>,
    released: HashMap<ObjectKind, usize>,
    acquisitions: Vec<(ObjectKind, u64)>,
    releases: Vec<(ObjectKind, u64)>,
    creation_failures: Vec<(ObjectKind, usize)>,
    /// (操作, 失败前还要成功的次数)
    op_failures: Vec<(MockOp, usize)>,
    adapters: Vec<AdapterProfile>,
    fence_mode: FenceMode,
    fences: HashMap<u64, FenceState>,
    armed_events: HashMap<u64, (u64, u64)>,
    /// 分配器 -> 最后一次提交对应的 (栅栏, 值)
    allocator_guards: HashMap<u64, (u64, u64)>,
    /// 已提交但还没有 Signal 的分配器
    unfenced_allocators: Vec<u64>,
    allocator_violations: usize,
    buffers: HashMap<u64, Rc<[Cell<u8>]>>,
}

impl MockState {
    fn new(adapters: Vec<AdapterProfile>) -> Self {
        Self {
            calls: Vec::new(),
            next_id: 0,
            attempts: HashMap::new(),
            created: HashMap::new(),
            released: HashMap::new(),
            acquisitions: Vec::new(),
            releases: Vec::new(),
            creation_failures: Vec::new(),
            op_failures: Vec::new(),
            adapters,
            fence_mode: FenceMode::Immediate,
            fences: HashMap::new(),
            armed_events: HashMap::new(),
            allocator_guards: HashMap::new(),
            unfenced_allocators: Vec::new(),
            allocator_violations: 0,
            buffers: HashMap::new(),
        }
    }

    fn take_failure(&mut self, op: MockOp) -> bool {
        let Some(pos) = self.op_failures.iter().position(|&(o, _)| o == op) else {
            return false;
        };
        if self.op_failures[pos].1 > 0 {
            self.op_failures[pos].1 -= 1;
            return false;
        }
        self.op_failures.remove(pos);
        true
    }

    fn check(&mut self, op: MockOp) -> ApiResult<()> {
        if self.take_failure(op) {
            let code = match op {
                MockOp::Present | MockOp::Wait => DXGI_ERROR_DEVICE_REMOVED,
                _ => ApiError::E_FAIL,
            };
            return Err(ApiError::new(code, format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

type Shared = Rc<RefCell<MockState>>;

/// 模拟对象的公共部分：标识 + 析构时登记释放
struct Handle {
    id: u64,
    kind: ObjectKind,
    state: Shared,
}

impl Handle {
    fn create(state: &Shared, kind: ObjectKind) -> ApiResult<Self> {
        let mut s = state.borrow_mut();
        let attempt = {
            let attempts = s.attempts.entry(kind).or_insert(0);
            *attempts += 1;
            *attempts
        };

        if s.creation_failures.contains(&(kind, attempt)) {
            s.calls.push(MockCall::CreateFailed { kind, attempt });
            return Err(ApiError::new(
                E_OUTOFMEMORY,
                format!("injected failure creating {kind:?} #{attempt}"),
            ));
        }

        s.next_id += 1;
        let id = s.next_id;
        *s.created.entry(kind).or_insert(0) += 1;
        s.acquisitions.push((kind, id));
        s.calls.push(MockCall::Create { kind, id });
        trace!(?kind, id, "Mock object created");

        Ok(Self { id, kind, state: Rc::clone(state) })
    }

    fn record(&self, call: MockCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Ok(mut s) = self.state.try_borrow_mut() {
            *s.released.entry(self.kind).or_insert(0) += 1;
            s.releases.push((self.kind, self.id));
        }
    }
}

/// 模拟 GPU
///
/// 克隆得到的是同一个 GPU 的另一个句柄，测试用它观察后端内部状态。
#[derive(Clone)]
pub struct MockGpu {
    state: Shared,
}

impl Default for MockGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockGpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGpu").finish_non_exhaustive()
    }
}

impl MockGpu {
    /// 只有一块支持 D3D12 的硬件适配器
    pub fn new() -> Self {
        Self::with_adapters(vec![AdapterProfile::hardware("Mock Hardware Adapter")])
    }

    pub fn with_adapters(adapters: Vec<AdapterProfile>) -> Self {
        Self { state: Rc::new(RefCell::new(MockState::new(adapters))) }
    }

    pub fn set_fence_mode(&self, mode: FenceMode) {
        self.state.borrow_mut().fence_mode = mode;
    }

    /// 第 `nth` 次（从 1 开始）创建 `kind` 时失败
    pub fn fail_creation(&self, kind: ObjectKind, nth: usize) {
        self.state.borrow_mut().creation_failures.push((kind, nth));
    }

    /// `op` 的下一次调用失败
    pub fn fail_operation(&self, op: MockOp) {
        self.fail_operation_after(op, 0);
    }

    /// `op` 再成功 `skip` 次之后的那一次调用失败
    pub fn fail_operation_after(&self, op: MockOp, skip: usize) {
        self.state.borrow_mut().op_failures.push((op, skip));
    }

    /// 让所有已 Signal 的工作立即完成
    pub fn complete_gpu_work(&self) {
        for fence in self.state.borrow_mut().fences.values_mut() {
            fence.completed = fence.signaled;
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.borrow().calls.clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn created(&self, kind: ObjectKind) -> usize {
        self.state.borrow().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn released(&self, kind: ObjectKind) -> usize {
        self.state.borrow().released.get(&kind).copied().unwrap_or(0)
    }

    /// 尚未释放的对象数量
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.created(kind) - self.released(kind)
    }

    /// 按创建顺序排列的 (类型, 标识)
    pub fn acquisition_order(&self) -> Vec<(ObjectKind, u64)> {
        self.state.borrow().acquisitions.clone()
    }

    /// 按释放顺序排列的 (类型, 标识)
    pub fn release_order(&self) -> Vec<(ObjectKind, u64)> {
        self.state.borrow().releases.clone()
    }

    /// 在 GPU 仍在使用时尝试重置分配器的次数
    pub fn allocator_violations(&self) -> usize {
        self.state.borrow().allocator_violations
    }

    /// 读取上传缓冲区的内容
    pub fn buffer_bytes(&self, gpu_address: u64) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buffers
            .get(&gpu_address)
            .map(|bytes| bytes.iter().map(Cell::get).collect())
    }
}

pub struct MockDebugLayer(Handle);
pub struct MockFactory(Handle);
pub struct MockDevice(Handle);
pub struct MockQueue(Handle);
pub struct MockAllocator(Handle);
pub struct MockFence(Handle);
pub struct MockEvent(Handle);

pub struct MockAdapter {
    handle: Handle,
    index: u32,
    profile: AdapterProfile,
}

pub struct MockCommandList {
    handle: Handle,
    allocator: Cell<u64>,
    open: Cell<bool>,
}

pub struct MockDescriptorHeap {
    handle: Handle,
    start: usize,
}

pub struct MockResource {
    handle: Handle,
    gpu_address: u64,
    bytes: Rc<[Cell<u8>]>,
}

pub struct MockSwapChain {
    handle: Handle,
    current: Cell<u32>,
    buffer_count: u32,
}

impl MockResource {
    /// 对象标识，与 `MockCall` 中记录的一致
    pub fn id(&self) -> u64 {
        self.handle.id
    }
}

impl Backend for MockGpu {
    type DebugLayer = MockDebugLayer;
    type Factory = MockFactory;
    type Adapter = MockAdapter;
    type Device = MockDevice;
    type CommandQueue = MockQueue;
    type CommandAllocator = MockAllocator;
    type Fence = MockFence;
    type CommandList = MockCommandList;
    type DescriptorHeap = MockDescriptorHeap;
    type Resource = MockResource;
    type SwapChain = MockSwapChain;
    type Event = MockEvent;

    fn name(&self) -> &'static str {
        "Mock"
    }

    fn enable_debug_layer(&self) -> ApiResult<MockDebugLayer> {
        self.state.borrow_mut().calls.push(MockCall::EnableDebugLayer);
        Ok(MockDebugLayer(Handle::create(&self.state, ObjectKind::DebugLayer)?))
    }

    fn create_factory(&self, debug: bool) -> ApiResult<MockFactory> {
        self.state.borrow_mut().calls.push(MockCall::CreateFactory { debug });
        Ok(MockFactory(Handle::create(&self.state, ObjectKind::Factory)?))
    }

    fn probe_device(&self, adapter: &MockAdapter, level: FeatureLevel) -> ApiResult<()> {
        let profile = &adapter.profile;
        self.state.borrow_mut().calls.push(MockCall::ProbeDevice {
            adapter: profile.description.clone(),
            level,
        });
        if !profile.supports_d3d12 {
            return Err(ApiError::new(
                DXGI_ERROR_UNSUPPORTED,
                format!("{} does not support {level}", profile.description),
            ));
        }
        Ok(())
    }

    fn create_device(&self, adapter: &MockAdapter, level: FeatureLevel) -> ApiResult<MockDevice> {
        self.state.borrow_mut().calls.push(MockCall::CreateDevice {
            adapter: adapter.profile.description.clone(),
        });
        if !adapter.profile.supports_d3d12 {
            return Err(ApiError::new(DXGI_ERROR_UNSUPPORTED, "D3D12CreateDevice failed"));
        }
        Ok(MockDevice(Handle::create(&self.state, ObjectKind::Device)?))
    }

    fn create_event(&self) -> ApiResult<MockEvent> {
        Ok(MockEvent(Handle::create(&self.state, ObjectKind::Event)?))
    }
}

impl Factory<MockGpu> for MockFactory {
    fn enum_adapter(&self, index: u32) -> ApiResult<Option<MockAdapter>> {
        let profile = {
            let mut s = self.0.state.borrow_mut();
            s.calls.push(MockCall::EnumAdapter { index });
            s.check(MockOp::EnumAdapter)?;
            match s.adapters.get(index as usize) {
                Some(profile) => profile.clone(),
                None => return Ok(None),
            }
        };
        let handle = Handle::create(&self.0.state, ObjectKind::Adapter)?;
        Ok(Some(MockAdapter { handle, index, profile }))
    }

    fn enum_warp_adapter(&self) -> ApiResult<MockAdapter> {
        self.0.record(MockCall::EnumWarpAdapter);
        let handle = Handle::create(&self.0.state, ObjectKind::Adapter)?;
        Ok(MockAdapter {
            handle,
            index: u32::MAX,
            profile: AdapterProfile::software("Microsoft Basic Render Driver"),
        })
    }

    fn create_swap_chain(
        &self,
        _queue: &MockQueue,
        _surface: SurfaceHandle,
        desc: &SwapChainDesc,
    ) -> ApiResult<MockSwapChain> {
        self.0.record(MockCall::CreateSwapChain {
            width: desc.width,
            height: desc.height,
            buffer_count: desc.buffer_count,
        });
        let handle = Handle::create(&self.0.state, ObjectKind::SwapChain)?;
        Ok(MockSwapChain { handle, current: Cell::new(0), buffer_count: desc.buffer_count })
    }
}

impl Adapter for MockAdapter {
    fn desc(&self) -> ApiResult<AdapterDesc> {
        Ok(AdapterDesc {
            description: self.profile.description.clone(),
            vendor_id: if self.profile.software { 0x1414 } else { 0x10DE },
            device_id: self.index,
            dedicated_video_memory: if self.profile.software { 0 } else { 8 << 30 },
            software: self.profile.software,
        })
    }
}

impl Device<MockGpu> for MockDevice {
    fn create_command_queue(&self, _ty: CommandListType) -> ApiResult<MockQueue> {
        Ok(MockQueue(Handle::create(&self.0.state, ObjectKind::CommandQueue)?))
    }

    fn create_command_allocator(&self, _ty: CommandListType) -> ApiResult<MockAllocator> {
        Ok(MockAllocator(Handle::create(&self.0.state, ObjectKind::CommandAllocator)?))
    }

    fn create_fence(&self, initial_value: u64) -> ApiResult<MockFence> {
        let handle = Handle::create(&self.0.state, ObjectKind::Fence)?;
        self.0.state.borrow_mut().fences.insert(
            handle.id,
            FenceState { completed: initial_value, signaled: initial_value },
        );
        Ok(MockFence(handle))
    }

    fn create_command_list(
        &self,
        _ty: CommandListType,
        allocator: &MockAllocator,
    ) -> ApiResult<MockCommandList> {
        let handle = Handle::create(&self.0.state, ObjectKind::CommandList)?;
        Ok(MockCommandList {
            handle,
            allocator: Cell::new(allocator.0.id),
            open: Cell::new(true),
        })
    }

    fn create_descriptor_heap(&self, _ty: DescriptorHeapType, _count: u32) -> ApiResult<MockDescriptorHeap> {
        let handle = Handle::create(&self.0.state, ObjectKind::DescriptorHeap)?;
        let start = 0x10_0000 * handle.id as usize;
        Ok(MockDescriptorHeap { handle, start })
    }

    fn descriptor_handle_increment_size(&self, _ty: DescriptorHeapType) -> u32 {
        RTV_DESCRIPTOR_SIZE
    }

    fn create_render_target_view(&self, resource: &MockResource, handle: CpuDescriptorHandle) {
        self.0.record(MockCall::CreateRenderTargetView { resource: resource.handle.id, handle });
    }

    fn create_upload_buffer(&self, size_in_bytes: u64) -> ApiResult<MockResource> {
        self.0.record(MockCall::CreateUploadBuffer { size: size_in_bytes });
        let handle = Handle::create(&self.0.state, ObjectKind::Resource)?;
        let gpu_address = 0x1_0000_0000 + (handle.id << 24);
        let bytes: Rc<[Cell<u8>]> = (0..size_in_bytes).map(|_| Cell::new(0)).collect();
        self.0.state.borrow_mut().buffers.insert(gpu_address, Rc::clone(&bytes));
        Ok(MockResource { handle, gpu_address, bytes })
    }
}

impl CommandQueue<MockGpu> for MockQueue {
    fn execute_command_lists(&self, lists: &[&MockCommandList]) {
        let mut s = self.0.state.borrow_mut();
        for list in lists {
            let allocator = list.allocator.get();
            if !s.unfenced_allocators.contains(&allocator) {
                s.unfenced_allocators.push(allocator);
            }
        }
        s.calls.push(MockCall::ExecuteCommandLists { count: lists.len() });
    }

    fn signal(&self, fence: &MockFence, value: u64) -> ApiResult<()> {
        let mut s = self.0.state.borrow_mut();
        s.calls.push(MockCall::Signal { fence: fence.0.id, value });
        s.check(MockOp::Signal)?;

        let immediate = s.fence_mode == FenceMode::Immediate;
        let state = s.fences.entry(fence.0.id).or_default();
        state.signaled = value;
        if immediate {
            state.completed = value;
        }

        let pending: Vec<u64> = s.unfenced_allocators.drain(..).collect();
        for allocator in pending {
            s.allocator_guards.insert(allocator, (fence.0.id, value));
        }
        Ok(())
    }
}

impl CommandAllocator for MockAllocator {
    fn reset(&self) -> ApiResult<()> {
        let mut s = self.0.state.borrow_mut();
        s.calls.push(MockCall::ResetAllocator { allocator: self.0.id });
        s.check(MockOp::AllocatorReset)?;

        let guard = s.allocator_guards.get(&self.0.id).copied();
        if let Some((fence, value)) = guard {
            let completed = s.fences.get(&fence).map(|f| f.completed).unwrap_or(0);
            if completed < value {
                s.allocator_violations += 1;
                return Err(ApiError::fail(format!(
                    "command allocator {} reset while fence {fence} is at {completed} < {value}",
                    self.0.id
                )));
            }
            s.allocator_guards.remove(&self.0.id);
        }
        Ok(())
    }
}

impl Fence<MockGpu> for MockFence {
    fn completed_value(&self) -> u64 {
        self.0.state.borrow().fences.get(&self.0.id).map(|f| f.completed).unwrap_or(0)
    }

    fn set_event_on_completion(&self, value: u64, event: &MockEvent) -> ApiResult<()> {
        let mut s = self.0.state.borrow_mut();
        s.calls.push(MockCall::SetEventOnCompletion { fence: self.0.id, value });
        s.check(MockOp::SetEventOnCompletion)?;
        s.armed_events.insert(event.0.id, (self.0.id, value));
        Ok(())
    }
}

impl WaitEvent for MockEvent {
    fn wait(&self, _timeout: Duration) -> ApiResult<WaitStatus> {
        let mut s = self.0.state.borrow_mut();
        let Some((fence, value)) = s.armed_events.remove(&self.0.id) else {
            // 没有被设置的事件永远不会触发
            s.calls.push(MockCall::Wait { fence: 0, value: 0, status: Some(WaitStatus::TimedOut) });
            return Ok(WaitStatus::TimedOut);
        };

        if let Err(e) = s.check(MockOp::Wait) {
            s.calls.push(MockCall::Wait { fence, value, status: None });
            return Err(e);
        }

        let mode = s.fence_mode;
        let state = s.fences.entry(fence).or_default();
        let status = if state.completed >= value {
            WaitStatus::Signaled
        } else if mode == FenceMode::Hung || state.signaled < value {
            WaitStatus::TimedOut
        } else {
            state.completed = state.signaled;
            WaitStatus::Signaled
        };

        s.calls.push(MockCall::Wait { fence, value, status: Some(status) });
        Ok(status)
    }
}

impl GraphicsCommandList<MockGpu> for MockCommandList {
    fn reset(&self, allocator: &MockAllocator) -> ApiResult<()> {
        let mut s = self.handle.state.borrow_mut();
        s.calls.push(MockCall::ResetCommandList { allocator: allocator.0.id });
        s.check(MockOp::CommandListReset)?;
        if self.open.get() {
            return Err(ApiError::fail("command list reset while still recording"));
        }
        self.allocator.set(allocator.0.id);
        self.open.set(true);
        Ok(())
    }

    fn close(&self) -> ApiResult<()> {
        let mut s = self.handle.state.borrow_mut();
        s.calls.push(MockCall::CloseCommandList);
        if !self.open.get() {
            return Err(ApiError::fail("command list closed twice"));
        }
        // 关闭失败的列表同样不能继续记录
        self.open.set(false);
        s.check(MockOp::CommandListClose)
    }

    fn resource_barrier(&self, barrier: &TransitionBarrier<'_, MockResource>) {
        self.handle.record(MockCall::Barrier {
            resource: barrier.resource.handle.id,
            before: barrier.before,
            after: barrier.after,
        });
    }

    fn clear_render_target_view(&self, handle: CpuDescriptorHandle, color: [f32; 4]) {
        self.handle.record(MockCall::ClearRenderTarget { handle, color });
    }

    fn om_set_render_targets(&self, handles: &[CpuDescriptorHandle]) {
        self.handle.record(MockCall::SetRenderTargets { handles: handles.to_vec() });
    }
}

impl DescriptorHeap for MockDescriptorHeap {
    fn cpu_handle_for_heap_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle::new(self.start)
    }
}

impl Resource for MockResource {
    fn map(&self, _read_range: Range<usize>) -> ApiResult<NonNull<u8>> {
        let mut s = self.handle.state.borrow_mut();
        s.calls.push(MockCall::Map { resource: self.handle.id });
        s.check(MockOp::Map)?;
        NonNull::new(self.bytes.as_ptr() as *mut u8)
            .ok_or_else(|| ApiError::fail("Map returned a null pointer"))
    }

    fn unmap(&self, _written_range: Option<Range<usize>>) -> ApiResult<()> {
        self.handle.record(MockCall::Unmap { resource: self.handle.id });
        Ok(())
    }

    fn gpu_virtual_address(&self) -> u64 {
        self.gpu_address
    }
}

impl SwapChain<MockGpu> for MockSwapChain {
    fn current_back_buffer_index(&self) -> u32 {
        self.current.get()
    }

    fn get_buffer(&self, _index: u32) -> ApiResult<MockResource> {
        let handle = Handle::create(&self.handle.state, ObjectKind::Resource)?;
        let gpu_address = 0x2_0000_0000 + (handle.id << 24);
        Ok(MockResource { handle, gpu_address, bytes: Rc::from(Vec::new()) })
    }

    fn present(&self, sync_interval: u32) -> ApiResult<()> {
        let mut s = self.handle.state.borrow_mut();
        s.calls.push(MockCall::Present { sync_interval, back_buffer: self.current.get() });
        s.check(MockOp::Present)?;
        self.current.set((self.current.get() + 1) % self.buffer_count.max(1));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_failure_is_counted_per_kind() {
        let gpu = MockGpu::new();
        gpu.fail_creation(ObjectKind::Fence, 2);

        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        let device = gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap();

        let first = device.create_fence(0).unwrap();
        assert!(device.create_fence(0).is_err());
        assert_eq!(gpu.created(ObjectKind::Fence), 1);

        drop(first);
        assert_eq!(gpu.released(ObjectKind::Fence), 1);
        assert_eq!(gpu.live(ObjectKind::Fence), 0);
    }

    #[test]
    fn test_enumeration_ends_with_none() {
        let gpu = MockGpu::with_adapters(vec![AdapterProfile::software("WARP")]);
        let factory = gpu.create_factory(false).unwrap();
        assert!(factory.enum_adapter(0).unwrap().unwrap().desc().unwrap().software);
        assert!(factory.enum_adapter(1).unwrap().is_none());
    }

    #[test]
    fn test_delayed_fence_completes_on_wait() {
        let gpu = MockGpu::new();
        gpu.set_fence_mode(FenceMode::Delayed);
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        let device = gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap();
        let queue = device.create_command_queue(CommandListType::Direct).unwrap();
        let fence = device.create_fence(0).unwrap();
        let event = gpu.create_event().unwrap();

        queue.signal(&fence, 1).unwrap();
        assert_eq!(fence.completed_value(), 0);

        fence.set_event_on_completion(1, &event).unwrap();
        assert_eq!(event.wait(Duration::from_secs(1)).unwrap(), WaitStatus::Signaled);
        assert_eq!(fence.completed_value(), 1);
    }

    #[test]
    fn test_mapped_bytes_are_visible() {
        let gpu = MockGpu::new();
        let factory = gpu.create_factory(false).unwrap();
        let adapter = factory.enum_adapter(0).unwrap().unwrap();
        let device = gpu.create_device(&adapter, FeatureLevel::MINIMUM).unwrap();
        let buffer = device.create_upload_buffer(4).unwrap();

        let ptr = buffer.map(0..0).unwrap();
        unsafe { std::ptr::copy_nonoverlapping([1u8, 2, 3, 4].as_ptr(), ptr.as_ptr(), 4) };
        buffer.unmap(None).unwrap();

        assert_eq!(gpu.buffer_bytes(buffer.gpu_virtual_address()), Some(vec![1, 2, 3, 4]));
    }
}
