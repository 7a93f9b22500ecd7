//! The emulated console.
//!
//! `Psx` owns every component of the machine. The CPU, the interconnect and
//! the peripherals are driven through free functions taking `&mut Psx` so
//! that any of them can reach the rest of the system (a DMA transfer touches
//! RAM, the GPU and the interrupt controller, a CPU store can start a DMA
//! transfer...).

pub mod bios;
pub mod bus;
pub mod cache;
pub mod cpu;
pub mod dma;
pub mod exe;
pub mod gpu;
pub mod hooks;
pub mod irq;
pub mod memory_control;
pub mod memory_map;
pub mod ram;
pub mod sync;
pub mod timers;

use crate::config::{Config, TraceFlags};
use crate::error::Result;
use std::mem;

/// Signed so that deltas between two dates can go negative. The counters are
/// periodically rebased to stay far from the overflow.
pub type CycleCount = i32;

/// CPU clock frequency in Hz
pub const CPU_FREQ_HZ: CycleCount = 33_868_800;

pub struct Psx {
    /// Date of the CPU, every other component is synchronized against it
    pub cycle_counter: CycleCount,
    pub sync: sync::Synchronizer,
    pub cpu: cpu::Cpu,
    pub cop0: cpu::cop0::Cop0,
    pub gte: cpu::gte::Gte,
    pub irq: irq::InterruptState,
    pub dma: dma::Dma,
    pub timers: timers::Timers,
    pub gpu: Box<dyn gpu::GpuPort>,
    pub video: gpu::VideoTiming,
    pub ram: ram::Ram,
    pub scratch_pad: ram::ScratchPad,
    pub bios: bios::Bios,
    pub mem_control: memory_control::MemoryControl,
    pub cache_control: cache::CacheControl,
    pub icache: cache::InstructionCache,
    pub trace: TraceFlags,
    hooks: Vec<Box<dyn hooks::PcHook>>,
}

impl Psx {
    pub fn new(bios: bios::Bios, config: &Config) -> Result<Psx> {
        let mut psx = Psx {
            cycle_counter: 0,
            sync: sync::Synchronizer::new(),
            cpu: cpu::Cpu::new(),
            cop0: cpu::cop0::Cop0::new(),
            gte: cpu::gte::Gte::new(),
            irq: irq::InterruptState::new(),
            dma: dma::Dma::new(),
            timers: timers::Timers::new(),
            gpu: Box::new(gpu::Gpu::new()),
            video: gpu::VideoTiming::new(),
            ram: ram::Ram::new(config.ram_size),
            scratch_pad: ram::ScratchPad::new(),
            bios,
            mem_control: memory_control::MemoryControl::new(config.ram_size),
            cache_control: cache::CacheControl::new(),
            icache: cache::InstructionCache::new(),
            trace: config.trace_flags(),
            hooks: Vec::new(),
        };

        if config.bios_tty {
            psx.add_hook(Box::new(hooks::BiosTty::new()));
        }

        if let Some(path) = &config.side_load {
            let exe = exe::Exe::from_file(path)?;
            info!("Side-loading {} ({} bytes)", path.display(), exe.text().len());
            psx.add_hook(Box::new(hooks::ExeSideLoader::new(exe)));
        }

        gpu::start_video_timing(&mut psx);

        Ok(psx)
    }

    /// Replace the default status-only GPU with another implementation
    pub fn set_gpu(&mut self, gpu: Box<dyn gpu::GpuPort>) {
        self.gpu = gpu;
    }

    /// Register a hook that gets to look at the CPU state before every
    /// instruction fetch
    pub fn add_hook(&mut self, hook: Box<dyn hooks::PcHook>) {
        self.hooks.push(hook);
    }

    pub(crate) fn has_hooks(&self) -> bool {
        !self.hooks.is_empty()
    }

    pub(crate) fn run_hooks(&mut self) -> Result<()> {
        // The hooks need the whole machine, take them out while they run
        let mut hooks = mem::take(&mut self.hooks);

        let res = hooks.iter_mut().try_for_each(|h| h.on_pc(self));

        hooks.append(&mut self.hooks);
        self.hooks = hooks;

        res
    }

    /// Advance the CPU date
    pub fn tick(&mut self, cycles: CycleCount) {
        self.cycle_counter += cycles;
    }

    /// Retire a single instruction. Pending events are *not* handled, use
    /// `run_until_next_event` or `run_frame` for that.
    pub fn run_next_instruction(&mut self) -> Result<()> {
        cpu::run_next_instruction(self)
    }

    /// Run the CPU up to the next scheduled event then let the scheduler
    /// dispatch it
    pub fn run_until_next_event(&mut self) -> Result<()> {
        while !sync::is_event_pending(self) {
            cpu::run_next_instruction(self)?;
        }

        sync::handle_events(self)
    }

    /// Run until the GPU reaches the next vertical blanking
    pub fn run_frame(&mut self) -> Result<()> {
        let frame = self.video.frame();

        while self.video.frame() == frame {
            self.run_until_next_event()?;
        }

        Ok(())
    }

    /// Number of frames emulated so far
    pub fn frame(&self) -> u32 {
        self.video.frame()
    }
}

/// Width of a bus access
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessWidth {
    Byte = 1,
    HalfWord = 2,
    Word = 4,
}

impl AccessWidth {
    /// Width in bytes
    pub fn bytes(self) -> u32 {
        self as u32
    }
}

/// Trait representing the attributes of a primitive addressable memory
/// location.
pub trait Addressable: Copy {
    /// Retreive the width of the access
    fn width() -> AccessWidth;
    /// Build an Addressable value from an u32. If the Addressable is 8 or 16
    /// bits wide the MSBs are discarded to fit.
    fn from_u32(val: u32) -> Self;
    /// Retreive the value of the Addressable as an u32
    fn as_u32(&self) -> u32;

    /// Read a little endian value from the start of `buf`
    fn load(buf: &[u8]) -> Self {
        let v = buf
            .iter()
            .take(Self::width().bytes() as usize)
            .enumerate()
            .fold(0u32, |v, (i, &b)| v | (u32::from(b) << (i * 8)));

        Self::from_u32(v)
    }

    /// Write the value little endian at the start of `buf`
    fn store(self, buf: &mut [u8]) {
        let v = self.as_u32();

        for (i, b) in buf
            .iter_mut()
            .take(Self::width().bytes() as usize)
            .enumerate()
        {
            *b = (v >> (i * 8)) as u8;
        }
    }
}

impl Addressable for u8 {
    fn width() -> AccessWidth {
        AccessWidth::Byte
    }

    fn from_u32(v: u32) -> u8 {
        v as u8
    }

    fn as_u32(&self) -> u32 {
        u32::from(*self)
    }
}

impl Addressable for u16 {
    fn width() -> AccessWidth {
        AccessWidth::HalfWord
    }

    fn from_u32(v: u32) -> u16 {
        v as u16
    }

    fn as_u32(&self) -> u32 {
        u32::from(*self)
    }
}

impl Addressable for u32 {
    fn width() -> AccessWidth {
        AccessWidth::Word
    }

    fn from_u32(v: u32) -> u32 {
        v
    }

    fn as_u32(&self) -> u32 {
        *self
    }
}
