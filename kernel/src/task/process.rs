//! Task control blocks, the round-robin scheduler, and the Unix-style
//! process lifecycle (spec.md §3/§4.3/§4.4).
//!
//! Tasks live in a fixed-size arena indexed by [`TaskId`], a stable
//! `usize` slot number rather than an owning pointer — the arena itself
//! never moves, so a `TaskId` stays valid for as long as its slot is
//! occupied (spec.md §9's suggested representation). Switching tasks is
//! a hardware task switch: a far jump to the target's TSS selector
//! (`arch::cpu::far_jump_to_task`), so the bulk of what looks like
//! "context save" in a software-scheduled kernel is just building the
//! right `Tss` once, at task creation.

use crate::arch::gdt::{self, GdtEntry};
use crate::arch::tss::Tss;
use crate::config;
use crate::fs::elf::{ElfImage, PF_W};
use crate::fs::file_table::FileTable;
use crate::memory::address::{PhysAddr, VirtAddr, PAGE_SIZE};
use crate::memory::paging::{self, PageFlags};
use crate::memory::pmm;
use crate::sync::spinlock::{enter_protection, leave_protection, SpinLock};
use crate::traps::entry::TrapFrame;
use crate::util::error::{KResult, KernelError};
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

pub type TaskId = usize;
pub const INVALID_TASK: TaskId = usize::MAX;

const KSTACK_SIZE: usize = 16 * 1024;
const DEFAULT_TIME_SLICE: u32 = 5;
const USER_STACK_TOP: u32 = 0xBFFF_F000;
const USER_STACK_SIZE: u32 = PAGE_SIZE * 4;

/// A fixed-capacity FIFO of task ids, used for the ready queue and for
/// each task's "who is waiting on me" lists (spec.md §3/§4.4).
pub struct WaitQueue {
    slots: [TaskId; config::TASK_NR],
    head: usize,
    len: usize,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { slots: [INVALID_TASK; config::TASK_NR], head: 0, len: 0 }
    }

    pub fn push_back(&mut self, id: TaskId) {
        debug_assert!(self.len < config::TASK_NR, "wait queue overflow");
        let idx = (self.head + self.len) % config::TASK_NR;
        self.slots[idx] = id;
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<TaskId> {
        if self.len == 0 {
            return None;
        }
        let id = self.slots[self.head];
        self.head = (self.head + 1) % config::TASK_NR;
        self.len -= 1;
        Some(id)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Ready,
    Running,
    Sleeping,
    Blocked,
    Zombie,
}

pub struct Tcb {
    state: ProcessState,
    in_use: bool,
    pub name: [u8; 32],
    pub pid: u32,
    pub parent: TaskId,
    pub heap_start: u32,
    pub heap_end: u32,
    pub exit_status: i32,
    pub sleep_ticks: u32,
    pub time_slice: u32,
    pub slice_ticks: u32,
    pub file_table: FileTable,
    pub tss: Tss,
    pub tss_selector: u16,
    pub page_dir: PhysAddr,
    /// Tasks blocked in `wait()` for one of this task's children to
    /// become a zombie. Belongs to the parent, not the children.
    wait_queue: WaitQueue,
    kstack: [u8; KSTACK_SIZE],
}

impl Tcb {
    const fn new() -> Self {
        Self {
            state: ProcessState::Created,
            in_use: false,
            name: [0; 32],
            pid: 0,
            parent: INVALID_TASK,
            heap_start: 0,
            heap_end: 0,
            exit_status: 0,
            sleep_ticks: 0,
            time_slice: DEFAULT_TIME_SLICE,
            slice_ticks: DEFAULT_TIME_SLICE,
            file_table: FileTable::new(),
            tss: Tss::new(),
            tss_selector: 0,
            page_dir: PhysAddr::new(0),
            wait_queue: WaitQueue::new(),
            kstack: [0; KSTACK_SIZE],
        }
    }

    fn kstack_top(&self) -> u32 {
        self.kstack.as_ptr() as u32 + KSTACK_SIZE as u32
    }

    /// Clears a slot for reuse without reconstructing the (large)
    /// embedded kernel stack.
    fn reset(&mut self) {
        self.state = ProcessState::Created;
        self.in_use = false;
        self.name = [0; 32];
        self.pid = 0;
        self.parent = INVALID_TASK;
        self.heap_start = 0;
        self.heap_end = 0;
        self.exit_status = 0;
        self.sleep_ticks = 0;
        self.time_slice = DEFAULT_TIME_SLICE;
        self.slice_ticks = DEFAULT_TIME_SLICE;
        self.file_table = FileTable::new();
        self.tss = Tss::new();
        self.tss_selector = 0;
        self.page_dir = PhysAddr::new(0);
        self.wait_queue = WaitQueue::new();
    }
}

static TASKS: SpinLock<[Tcb; config::TASK_NR]> = SpinLock::new([const { Tcb::new() }; config::TASK_NR]);
static READY_QUEUE: SpinLock<WaitQueue> = SpinLock::new(WaitQueue::new());
static CURRENT: AtomicUsize = AtomicUsize::new(INVALID_TASK);
static IDLE_TASK: AtomicUsize = AtomicUsize::new(INVALID_TASK);
static INIT_TASK: AtomicUsize = AtomicUsize::new(INVALID_TASK);
static NEXT_PID: AtomicU32 = AtomicU32::new(1);

fn alloc_pid() -> u32 {
    NEXT_PID.fetch_add(1, Ordering::Relaxed)
}

fn alloc_slot() -> KResult<TaskId> {
    let mut tasks = TASKS.lock();
    for i in 0..config::TASK_NR {
        if !tasks[i].in_use {
            tasks[i].in_use = true;
            return Ok(i);
        }
    }
    Err(KernelError::OutOfTasks)
}

/// Runs `f` with mutable access to two distinct slots at once. Panics if
/// `a == b` — a task is never its own parent or child.
fn with_two_mut<R>(tasks: &mut [Tcb], a: TaskId, b: TaskId, f: impl FnOnce(&mut Tcb, &mut Tcb) -> R) -> R {
    assert_ne!(a, b, "process: a task cannot be paired with itself");
    if a < b {
        let (left, right) = tasks.split_at_mut(b);
        f(&mut left[a], &mut right[0])
    } else {
        let (left, right) = tasks.split_at_mut(a);
        f(&mut right[0], &mut left[b])
    }
}

const fn align_up(x: u32) -> u32 {
    (x + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

fn build_user_tss(page_dir: PhysAddr, kstack_top: u32, eip: u32, esp: u32) -> Tss {
    let mut tss = Tss::new();
    let app = gdt::app_selectors();
    tss.set_user_segments(app.user_code, app.user_data);
    tss.cr3 = page_dir.as_u32();
    tss.eip = eip;
    tss.esp = esp;
    tss.eflags = Tss::DEFAULT_EFLAGS;
    tss.esp0 = kstack_top;
    tss.ss0 = gdt::SEL_KERNEL_DATA;
    tss
}

/// Maps every `PT_LOAD` segment of `elf` into `dir` and returns the
/// page-aligned end of the highest segment, used as the process's
/// initial `sbrk` break.
fn load_segments(dir: PhysAddr, elf: &ElfImage) -> KResult<u32> {
    let mut highest_end = 0u32;
    for phdr in elf.program_headers() {
        if !phdr.is_load() {
            continue;
        }
        let mut flags = PageFlags::PRESENT | PageFlags::USER;
        if phdr.p_flags & PF_W != 0 {
            flags |= PageFlags::WRITABLE;
        }
        let start_page = phdr.p_vaddr & !(PAGE_SIZE - 1);
        let end = phdr.p_vaddr + phdr.p_memsz;
        let mut page = start_page;
        while page < end {
            let frame = pmm::alloc_frame_zeroed()?;
            if let Err(e) = paging::map_page_in(dir, VirtAddr::new(page), frame, flags) {
                pmm::free_frame(frame);
                return Err(e);
            }
            page += PAGE_SIZE;
        }
        let data = elf.segment_data(&phdr)?;
        paging::copy_to(dir, VirtAddr::new(phdr.p_vaddr), data.as_ptr(), data.len())?;
        highest_end = highest_end.max(align_up(end));
    }
    Ok(highest_end)
}

fn map_user_stack(dir: PhysAddr) -> KResult<()> {
    let mut page = USER_STACK_TOP - USER_STACK_SIZE;
    while page < USER_STACK_TOP {
        let frame = pmm::alloc_frame_zeroed()?;
        if let Err(e) = paging::map_page_in(dir, VirtAddr::new(page), frame, PageFlags::USER_RW) {
            pmm::free_frame(frame);
            return Err(e);
        }
        page += PAGE_SIZE;
    }
    Ok(())
}

/// Allocates the idle task's slot and loads the task register with it.
/// Must run once, after `arch::gdt::init`.
pub fn init() {
    let idle = alloc_slot().expect("process: no slot for the idle task");
    let selector = {
        let mut tasks = TASKS.lock();
        let tcb = &mut tasks[idle];
        tcb.name[..4].copy_from_slice(b"idle");
        tcb.pid = 0;
        tcb.parent = INVALID_TASK;
        tcb.page_dir = PhysAddr::new(crate::arch::cpu::read_cr3());
        tcb.tss.set_kernel_segments(gdt::SEL_KERNEL_CODE, gdt::SEL_KERNEL_DATA);
        tcb.tss.cr3 = tcb.page_dir.as_u32();
        tcb.tss.eip = idle_loop as usize as u32;
        tcb.tss.esp = tcb.kstack_top();
        tcb.tss.eflags = Tss::DEFAULT_EFLAGS;
        tcb.state = ProcessState::Running;
        gdt::GDT.lock().alloc_slot(GdtEntry::tss(&tcb.tss)).expect("process: no gdt slot for the idle task")
    };
    TASKS.lock()[idle].tss_selector = selector;
    IDLE_TASK.store(idle, Ordering::Relaxed);
    CURRENT.store(idle, Ordering::Relaxed);
    unsafe { crate::arch::cpu::ltr(selector) };
    log::info!("process: task pool ready, idle on slot {}", idle);
}

extern "C" fn idle_loop() -> ! {
    loop {
        crate::arch::cpu::halt_forever();
    }
}

pub fn current_id() -> TaskId {
    CURRENT.load(Ordering::Relaxed)
}

pub fn getpid() -> i32 {
    TASKS.lock()[current_id()].pid as i32
}

/// Marks `id` ready and enqueues it. Safe to call for a task that is
/// already ready; it will simply run again sooner.
pub fn ready(id: TaskId) {
    {
        let mut tasks = TASKS.lock();
        tasks[id].state = ProcessState::Ready;
    }
    READY_QUEUE.lock().push_back(id);
}

/// Blocks the current task on `queue` and switches away. Returns once
/// some other task has called [`wake_one_from`] or [`ready`] on it and
/// the scheduler has switched back in. The caller must already hold
/// interrupts disabled (see `sync::semaphore`/`sync::mutex`).
pub fn block_current_on(queue: &mut WaitQueue) {
    let id = current_id();
    {
        let mut tasks = TASKS.lock();
        tasks[id].state = ProcessState::Blocked;
    }
    queue.push_back(id);
    dispatch();
}

/// Pops the head of `queue`, if any, and readies it. Returns whether a
/// task was woken.
pub fn wake_one_from(queue: &mut WaitQueue) -> bool {
    match queue.pop_front() {
        Some(id) => {
            ready(id);
            true
        }
        None => false,
    }
}

/// Picks the next ready task (or idle, if none) and performs the
/// hardware task switch. Returns once this task has been switched back
/// into by some future call to `dispatch` elsewhere.
fn dispatch() {
    let next = READY_QUEUE.lock().pop_front().unwrap_or_else(|| IDLE_TASK.load(Ordering::Relaxed));
    let selector = {
        let mut tasks = TASKS.lock();
        tasks[next].state = ProcessState::Running;
        tasks[next].tss_selector
    };
    CURRENT.store(next, Ordering::Relaxed);
    unsafe { crate::arch::cpu::far_jump_to_task(selector) };
}

pub fn yield_now() {
    let id = current_id();
    if id != IDLE_TASK.load(Ordering::Relaxed) {
        ready(id);
    }
    dispatch();
}

/// Converts `ms` to ticks (rounding up) and puts the current task to
/// sleep. Resumed once `on_timer_tick` counts its `sleep_ticks` to zero.
pub fn msleep(ms: u32) {
    let tick_ms = config::get().tick_ms.max(1);
    let ticks = (ms + tick_ms - 1) / tick_ms;
    let id = current_id();
    {
        let mut tasks = TASKS.lock();
        tasks[id].sleep_ticks = ticks.max(1);
        tasks[id].state = ProcessState::Sleeping;
    }
    dispatch();
}

/// Timer-tick accounting (spec.md §4.8): advances every sleeping task's
/// countdown, waking any that reach zero, then either continues the
/// current task or rotates to the next ready one when its slice expires.
pub fn on_timer_tick() {
    let current = current_id();
    let mut to_wake = [INVALID_TASK; config::TASK_NR];
    let mut wake_count = 0;
    let mut should_switch = false;

    {
        let mut tasks = TASKS.lock();
        for i in 0..config::TASK_NR {
            if tasks[i].in_use && tasks[i].state == ProcessState::Sleeping {
                tasks[i].sleep_ticks = tasks[i].sleep_ticks.saturating_sub(1);
                if tasks[i].sleep_ticks == 0 {
                    tasks[i].state = ProcessState::Ready;
                    to_wake[wake_count] = i;
                    wake_count += 1;
                }
            }
        }
        if tasks[current].slice_ticks > 0 {
            tasks[current].slice_ticks -= 1;
        }
        if tasks[current].slice_ticks == 0 {
            tasks[current].slice_ticks = tasks[current].time_slice;
            should_switch = true;
        }
    }

    for &id in to_wake[..wake_count].iter() {
        READY_QUEUE.lock().push_back(id);
    }
    if should_switch {
        if current != IDLE_TASK.load(Ordering::Relaxed) {
            ready(current);
        }
        dispatch();
    }
}

/// Allocates a new task, an eagerly-copied address space, and duplicated
/// file descriptors from the calling task, continuing the child from the
/// exact register state the parent had at the `fork` syscall (spec.md
/// §4.3), except `eax`, which is zeroed so the child sees a 0 return.
pub fn fork(frame: &TrapFrame) -> KResult<i32> {
    let parent_id = current_id();
    let child_id = alloc_slot()?;

    let parent_dir = TASKS.lock()[parent_id].page_dir;
    let child_dir = match paging::copy_address_space(parent_dir) {
        Ok(dir) => dir,
        Err(e) => {
            TASKS.lock()[child_id].reset();
            return Err(e);
        }
    };

    let pid = alloc_pid();
    let user_esp = unsafe { frame.user_esp() };
    let kstack_top = TASKS.lock()[child_id].kstack_top();
    let mut tss = build_user_tss(child_dir, kstack_top, frame.eip, user_esp);
    tss.eax = 0;
    tss.ebx = frame.ebx;
    tss.ecx = frame.ecx;
    tss.edx = frame.edx;
    tss.esi = frame.esi;
    tss.edi = frame.edi;
    tss.ebp = frame.ebp;
    tss.eflags = frame.eflags;

    // `GdtEntry::tss` captures the address of whatever `Tss` it's handed;
    // that address must be the child's own slot in the static task pool,
    // never a stack temporary, so `tss` is written into place *before*
    // its address is taken.
    let selector = {
        let mut tasks = TASKS.lock();
        tasks[child_id].tss = tss;
        match gdt::GDT.lock().alloc_slot(GdtEntry::tss(&tasks[child_id].tss)) {
            Ok(sel) => sel,
            Err(e) => {
                drop(tasks);
                paging::destroy_address_space(child_dir);
                TASKS.lock()[child_id].reset();
                return Err(e);
            }
        }
    };

    {
        let mut tasks = TASKS.lock();
        let (heap_start, heap_end, name, time_slice) = {
            let p = &tasks[parent_id];
            (p.heap_start, p.heap_end, p.name, p.time_slice)
        };
        with_two_mut(&mut tasks, parent_id, child_id, |parent, child| {
            for (fd, slot) in parent.file_table.iter_mut() {
                if let Some(file) = slot {
                    child.file_table.dup_from(fd, file);
                }
            }
        });
        let child = &mut tasks[child_id];
        child.name = name;
        child.pid = pid;
        child.parent = parent_id;
        child.heap_start = heap_start;
        child.heap_end = heap_end;
        child.page_dir = child_dir;
        child.tss_selector = selector;
        child.time_slice = time_slice;
        child.slice_ticks = time_slice;
        child.state = ProcessState::Ready;
    }

    ready(child_id);
    Ok(pid as i32)
}

/// Replaces the current task's address space with a freshly loaded ELF
/// image, in place — same task id, same pid, same open files (spec.md
/// §4.3). There is no path/filesystem lookup in this kernel (a real
/// filesystem is an external collaborator); `image` is the already
/// resolved ELF bytes.
pub fn execve(image: &[u8], frame: &mut TrapFrame) -> KResult<()> {
    let elf = ElfImage::parse(image)?;
    let new_dir = paging::create_user_address_space()?;

    let highest_end = match load_segments(new_dir, &elf) {
        Ok(end) => end,
        Err(e) => {
            paging::destroy_address_space(new_dir);
            return Err(e);
        }
    };
    if let Err(e) = map_user_stack(new_dir) {
        paging::destroy_address_space(new_dir);
        return Err(e);
    }

    let id = current_id();
    let old_dir = {
        let mut tasks = TASKS.lock();
        let old = tasks[id].page_dir;
        tasks[id].page_dir = new_dir;
        tasks[id].heap_start = highest_end;
        tasks[id].heap_end = highest_end;
        tasks[id].tss.cr3 = new_dir.as_u32();
        old
    };
    paging::destroy_address_space(old_dir);
    unsafe {
        crate::arch::cpu::write_cr3(new_dir.as_u32());
        frame.set_user_esp(USER_STACK_TOP);
    }
    frame.eip = elf.entry();
    Ok(())
}

/// Marks `id` a zombie, closes its files, and reparents its own children
/// to the init task — scanning the whole task table, not the
/// file-descriptor table, which is the bound an earlier version of this
/// kernel's reparenting loop used by mistake (spec.md §9).
///
/// Must not hold the `TASKS` guard while waking anyone: `ready()` (called
/// from `wake_one_from`) takes its own `TASKS.lock()`, and `SpinLock` is
/// not reentrant, so waking a parent while still holding the guard that
/// found it would spin forever against itself (see DESIGN.md).
fn terminate(id: TaskId, status: i32) {
    let init_id = INIT_TASK.load(Ordering::Relaxed);
    let (parent_id, any_reparented_zombie) = {
        let mut tasks = TASKS.lock();
        let mut reparented_zombie = false;
        for i in 0..config::TASK_NR {
            if tasks[i].in_use && tasks[i].parent == id {
                tasks[i].parent = init_id;
                if tasks[i].state == ProcessState::Zombie {
                    reparented_zombie = true;
                }
            }
        }
        tasks[id].file_table.close_all();
        tasks[id].exit_status = status;
        tasks[id].state = ProcessState::Zombie;
        (tasks[id].parent, reparented_zombie)
    };

    let irq = enter_protection();
    if parent_id != INVALID_TASK {
        let woken = {
            let mut tasks = TASKS.lock();
            tasks[parent_id].wait_queue.pop_front()
        };
        if let Some(waiter) = woken {
            ready(waiter);
        }
    }
    if any_reparented_zombie && init_id != INVALID_TASK {
        let woken = {
            let mut tasks = TASKS.lock();
            tasks[init_id].wait_queue.pop_front()
        };
        if let Some(waiter) = woken {
            ready(waiter);
        }
    }
    leave_protection(irq);
}

/// Terminates the current task and switches away. Never returns: a
/// zombie is never placed back on the ready queue.
pub fn exit_current(status: i32) -> ! {
    terminate(current_id(), status);
    dispatch();
    unreachable!("process: a zombie task was rescheduled")
}

/// Frees a reaped zombie's address space and GDT slot and returns its
/// slot to the pool.
fn reap(id: TaskId) {
    let (dir, selector) = {
        let tasks = TASKS.lock();
        (tasks[id].page_dir, tasks[id].tss_selector)
    };
    paging::destroy_address_space(dir);
    gdt::GDT.lock().free_slot(selector);
    TASKS.lock()[id].reset();
}

/// Blocks until one of the current task's children becomes a zombie,
/// then reaps it and returns its pid and exit status. Fails immediately
/// if the current task has no children at all (spec.md §4.3/§4.4).
pub fn wait() -> KResult<(i32, i32)> {
    let me = current_id();
    loop {
        let zombie = {
            let tasks = TASKS.lock();
            (0..config::TASK_NR).find(|&i| tasks[i].in_use && tasks[i].parent == me && tasks[i].state == ProcessState::Zombie)
        };
        if let Some(child_id) = zombie {
            let (pid, status) = {
                let tasks = TASKS.lock();
                (tasks[child_id].pid, tasks[child_id].exit_status)
            };
            reap(child_id);
            return Ok((pid as i32, status));
        }

        let irq = enter_protection();
        let has_children = {
            let tasks = TASKS.lock();
            (0..config::TASK_NR).any(|i| tasks[i].in_use && tasks[i].parent == me)
        };
        if !has_children {
            leave_protection(irq);
            return Err(KernelError::NoSuchChild);
        }
        // Block directly on our own slot's `wait_queue` rather than going
        // through `block_current_on` (which would need a second, reentrant
        // `TASKS.lock()`): mark ourselves blocked and enqueue our own id in
        // the same locked section, then drop the guard before dispatching.
        {
            let mut tasks = TASKS.lock();
            tasks[me].state = ProcessState::Blocked;
            tasks[me].wait_queue.push_back(me);
        }
        dispatch();
        leave_protection(irq);
    }
}

/// Grows or shrinks the current task's heap break (spec.md §4.2's
/// `sbrk`-style growth; shrinking is a non-goal, enforced in
/// `memory::heap::sbrk`).
pub fn sbrk(incr: i32) -> KResult<i32> {
    let id = current_id();
    let (dir, mut heap_end) = {
        let tasks = TASKS.lock();
        (tasks[id].page_dir, tasks[id].heap_end)
    };
    let old = crate::memory::heap::sbrk(dir, &mut heap_end, incr)?;
    TASKS.lock()[id].heap_end = heap_end;
    Ok(old as i32)
}

/// Runs with a read view of the current task's file table, for syscalls
/// that read/write/open/close against it.
pub fn with_current_files<R>(f: impl FnOnce(&mut FileTable) -> R) -> R {
    let id = current_id();
    let mut tasks = TASKS.lock();
    f(&mut tasks[id].file_table)
}

/// Loads the kernel-image-embedded first task, makes it ready, and
/// switches to it. Never returns: `kmain`'s own stack frame is never
/// revisited once this hands off (spec.md §4.9).
pub fn spawn_first_task() -> ! {
    let elf = ElfImage::parse(&super::init_image::INIT_IMAGE).expect("process: embedded first task image is not a valid ELF");

    let id = alloc_slot().expect("process: no task slot for the first task");
    let dir = paging::create_user_address_space().expect("process: no memory for the first task's address space");
    let highest_end = load_segments(dir, &elf).expect("process: failed loading the first task's segments");
    map_user_stack(dir).expect("process: failed mapping the first task's stack");

    let pid = alloc_pid();
    let selector = {
        let mut tasks = TASKS.lock();
        let kstack_top = tasks[id].kstack_top();
        let tss = build_user_tss(dir, kstack_top, elf.entry(), USER_STACK_TOP);
        let tcb = &mut tasks[id];
        tcb.name[..4].copy_from_slice(b"init");
        tcb.pid = pid;
        tcb.parent = INVALID_TASK;
        tcb.page_dir = dir;
        tcb.heap_start = highest_end;
        tcb.heap_end = highest_end;
        tcb.tss = tss;
        tcb.state = ProcessState::Ready;
        gdt::GDT.lock().alloc_slot(GdtEntry::tss(&tcb.tss)).expect("process: no gdt slot for the first task")
    };
    TASKS.lock()[id].tss_selector = selector;
    INIT_TASK.store(id, Ordering::Relaxed);

    log::info!("process: first task spawned (pid {})", pid);
    ready(id);
    dispatch();
    unreachable!("dispatch() into the first task never returns")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_queue_is_fifo() {
        let mut q = WaitQueue::new();
        q.push_back(3);
        q.push_back(7);
        assert_eq!(q.pop_front(), Some(3));
        assert_eq!(q.pop_front(), Some(7));
        assert_eq!(q.pop_front(), None);
    }

    #[test]
    fn wait_queue_reports_empty() {
        let mut q = WaitQueue::new();
        assert!(q.is_empty());
        q.push_back(1);
        assert!(!q.is_empty());
    }
}
