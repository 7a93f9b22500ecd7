//! GPU register interface and video timing.
//!
//! The emulator core only needs the GPU as a DMA and register endpoint. The
//! default `Gpu` keeps the status register consistent, splits the GP0 word
//! stream into commands and hands them to a `Renderer`.

use super::dma;
use super::irq::Interrupt;
use super::sync::{self, SyncToken};
use super::{CycleCount, Psx, CPU_FREQ_HZ};
use arrayvec::ArrayVec;

/// CPU cycles per NTSC frame
pub const FRAME_CYCLES: CycleCount = CPU_FREQ_HZ / 60;

/// GPUSTAT interrupt request bit
const STATUS_IRQ: u32 = 1 << 24;

/// Interface between the core and a GPU implementation
pub trait GpuPort {
    /// GP0 write: rendering commands and VRAM transfers
    fn submit_primary(&mut self, val: u32);
    /// GP1 write: display control
    fn submit_control(&mut self, val: u32);
    /// GPUSTAT
    fn status(&self) -> u32;
    /// GPUREAD
    fn read(&mut self) -> u32;
    /// True if the GPU can accept a DMA block
    fn dma_can_write(&self) -> bool;
}

/// Receives complete GP0 commands
pub trait Renderer {
    fn command(&mut self, words: &[u32]);

    /// Pixel data of a CPU to VRAM transfer, two pixels per word
    fn image_data(&mut self, _word: u32) {}
}

/// Renderer that throws everything away
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn command(&mut self, _words: &[u32]) {}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DmaDirection {
    Off = 0,
    Fifo = 1,
    CpuToGp0 = 2,
    VRamToCpu = 3,
}

impl DmaDirection {
    fn from_bits(bits: u32) -> DmaDirection {
        match bits & 3 {
            0 => DmaDirection::Off,
            1 => DmaDirection::Fifo,
            2 => DmaDirection::CpuToGp0,
            _ => DmaDirection::VRamToCpu,
        }
    }
}

/// What the next GP0 word is
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Gp0Mode {
    /// Start or parameter of a command
    Command,
    /// Pixel data of a CPU to VRAM transfer
    ImageLoad { remaining: u32 },
}

/// Longest fixed size command: shaded textured quad
const MAX_COMMAND_LEN: usize = 12;

pub struct Gpu {
    /// GP0 0xe1 bits [10:0]: texture page, blending, dithering...
    draw_mode: u16,
    texture_disabled: bool,
    force_set_mask_bit: bool,
    preserve_masked_pixels: bool,
    /// GP1 0x08 fields: hres, vres, video mode, depth, interlace
    display_mode: u8,
    interlace_field: bool,
    display_disabled: bool,
    interrupt: bool,
    dma_direction: DmaDirection,
    texture_window: u32,
    drawing_area_top_left: u32,
    drawing_area_bottom_right: u32,
    drawing_offset: u32,
    gp0_mode: Gp0Mode,
    command: ArrayVec<u32, MAX_COMMAND_LEN>,
    /// Words expected for the command being assembled, 0 for polylines
    /// which end with a terminator word
    command_len: usize,
    polyline: bool,
    /// Words left to read in a VRAM to CPU transfer
    image_store_remaining: u32,
    /// Value returned by GPUREAD outside of VRAM transfers
    read_latch: u32,
    renderer: Box<dyn Renderer>,
}

impl Gpu {
    pub fn new() -> Gpu {
        Gpu::with_renderer(Box::new(NullRenderer))
    }

    pub fn with_renderer(renderer: Box<dyn Renderer>) -> Gpu {
        Gpu {
            draw_mode: 0,
            texture_disabled: false,
            force_set_mask_bit: false,
            preserve_masked_pixels: false,
            display_mode: 0,
            interlace_field: true,
            display_disabled: true,
            interrupt: false,
            dma_direction: DmaDirection::Off,
            texture_window: 0,
            drawing_area_top_left: 0,
            drawing_area_bottom_right: 0,
            drawing_offset: 0,
            gp0_mode: Gp0Mode::Command,
            command: ArrayVec::new(),
            command_len: 0,
            polyline: false,
            image_store_remaining: 0,
            read_latch: 0,
            renderer,
        }
    }

    fn reset(&mut self) {
        let renderer = std::mem::replace(&mut self.renderer, Box::new(NullRenderer));

        *self = Gpu::with_renderer(renderer);
    }

    fn reset_command_buffer(&mut self) {
        self.command.clear();
        self.command_len = 0;
        self.polyline = false;
        self.gp0_mode = Gp0Mode::Command;
    }

    fn gp0_command_word(&mut self, val: u32) {
        if self.command.is_empty() {
            let (len, polyline) = command_len(val);

            self.command_len = len;
            self.polyline = polyline;
        } else if self.polyline && (val & 0xf000_f000) == 0x5000_5000 {
            // End of a polyline
            self.renderer.command(&self.command);
            self.command.clear();
            self.polyline = false;
            return;
        }

        if self.command.try_push(val).is_err() {
            // Long polyline: forward what we have and keep going
            self.renderer.command(&self.command);
            let opcode = self.command[0];
            self.command.clear();
            self.command.push(opcode);
            self.command.push(val);
        }

        if self.polyline || self.command.len() < self.command_len {
            return;
        }

        self.gp0_execute();
        self.command.clear();
    }

    fn gp0_execute(&mut self) {
        let opcode = self.command[0] >> 24;
        let arg = self.command[0] & 0xff_ffff;

        match opcode {
            0x1f => self.interrupt = true,
            0xa0 => {
                let (width, height) = image_size(self.command[2]);
                // Two 16bit pixels per word, rounded up
                let remaining = (width * height + 1) / 2;

                if remaining > 0 {
                    self.gp0_mode = Gp0Mode::ImageLoad { remaining };
                }
            }
            0xc0 => {
                let (width, height) = image_size(self.command[2]);
                self.image_store_remaining = (width * height + 1) / 2;
            }
            0xe1 => {
                self.draw_mode = (arg & 0x7ff) as u16;
                self.texture_disabled = arg & (1 << 11) != 0;
            }
            0xe2 => self.texture_window = arg & 0xf_ffff,
            0xe3 => self.drawing_area_top_left = arg & 0xf_ffff,
            0xe4 => self.drawing_area_bottom_right = arg & 0xf_ffff,
            0xe5 => self.drawing_offset = arg & 0x3f_ffff,
            0xe6 => {
                self.force_set_mask_bit = arg & 1 != 0;
                self.preserve_masked_pixels = arg & 2 != 0;
            }
            _ => (),
        }

        self.renderer.command(&self.command);
    }
}

impl GpuPort for Gpu {
    fn submit_primary(&mut self, val: u32) {
        match self.gp0_mode {
            Gp0Mode::Command => self.gp0_command_word(val),
            Gp0Mode::ImageLoad { remaining } => {
                self.renderer.image_data(val);

                self.gp0_mode = if remaining > 1 {
                    Gp0Mode::ImageLoad {
                        remaining: remaining - 1,
                    }
                } else {
                    Gp0Mode::Command
                };
            }
        }
    }

    fn submit_control(&mut self, val: u32) {
        let opcode = val >> 24;
        let arg = val & 0xff_ffff;

        match opcode {
            0x00 => self.reset(),
            0x01 => self.reset_command_buffer(),
            0x02 => self.interrupt = false,
            0x03 => self.display_disabled = arg & 1 != 0,
            0x04 => self.dma_direction = DmaDirection::from_bits(arg),
            // Display area and ranges only matter to a renderer
            0x05..=0x07 => (),
            0x08 => {
                if arg & 0x80 != 0 {
                    warn!("Unsupported GPU reverse flag");
                }
                self.display_mode = (arg & 0x7f) as u8;
            }
            0x10..=0x1f => {
                self.read_latch = match arg & 7 {
                    2 => self.texture_window,
                    3 => self.drawing_area_top_left,
                    4 => self.drawing_area_bottom_right,
                    5 => self.drawing_offset,
                    // GPU version
                    7 => 2,
                    _ => self.read_latch,
                }
            }
            _ => debug!("Unhandled GP1 command 0x{:08x}", val),
        }
    }

    fn status(&self) -> u32 {
        let mode = u32::from(self.display_mode);

        let mut status = u32::from(self.draw_mode) & 0x7ff;

        status |= u32::from(self.force_set_mask_bit) << 11;
        status |= u32::from(self.preserve_masked_pixels) << 12;
        status |= u32::from(self.interlace_field) << 13;
        status |= u32::from(self.texture_disabled) << 15;
        // Horizontal resolution: hr2 in bit 16, hr1 in bits 17-18
        status |= ((mode >> 6) & 1) << 16;
        status |= (mode & 3) << 17;
        // Vertical resolution, video mode, display depth and interlace
        status |= ((mode >> 2) & 0xf) << 19;
        status |= u32::from(self.display_disabled) << 23;
        status |= u32::from(self.interrupt) << 24;
        // Always ready to receive commands, send VRAM and receive DMA blocks
        status |= 7 << 26;
        status |= (self.dma_direction as u32) << 29;

        let dma_request = match self.dma_direction {
            DmaDirection::Off => 0,
            DmaDirection::Fifo => 1,
            DmaDirection::CpuToGp0 => (status >> 28) & 1,
            DmaDirection::VRamToCpu => (status >> 27) & 1,
        };

        status | (dma_request << 25)
    }

    fn read(&mut self) -> u32 {
        if self.image_store_remaining > 0 {
            // No VRAM behind this GPU
            self.image_store_remaining -= 1;
            0
        } else {
            self.read_latch
        }
    }

    fn dma_can_write(&self) -> bool {
        true
    }
}

/// Number of words of the GP0 command starting with `word` and whether it's
/// a polyline ended by a terminator
fn command_len(word: u32) -> (usize, bool) {
    let opcode = word >> 24;

    let len = match opcode {
        0x02 => 3,
        0x20..=0x3f => {
            let vertices = if opcode & 8 != 0 { 4 } else { 3 };
            let textured = opcode & 4 != 0;
            let shaded = opcode & 0x10 != 0;

            1 + vertices
                + if textured { vertices } else { 0 }
                + if shaded { vertices - 1 } else { 0 }
        }
        0x40..=0x5f => {
            if opcode & 8 != 0 {
                return (0, true);
            }

            let shaded = opcode & 0x10 != 0;
            if shaded {
                4
            } else {
                3
            }
        }
        0x60..=0x7f => {
            let textured = opcode & 4 != 0;
            let variable_size = (opcode >> 3) & 3 == 0;

            2 + usize::from(textured) + usize::from(variable_size)
        }
        0x80..=0x9f => 4,
        0xa0..=0xdf => 3,
        _ => 1,
    };

    (len, false)
}

/// Width and height of a VRAM transfer from its size word
fn image_size(word: u32) -> (u32, u32) {
    let width = word & 0xffff;
    let height = word >> 16;

    // 0 means the maximum size
    let width = ((width.wrapping_sub(1)) & 0x3ff) + 1;
    let height = ((height.wrapping_sub(1)) & 0x1ff) + 1;

    (width, height)
}

/// Frame counter driven by the `Gpu` synchronization token
pub struct VideoTiming {
    frame: u32,
}

impl VideoTiming {
    pub fn new() -> VideoTiming {
        VideoTiming { frame: 0 }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }
}

pub fn start_video_timing(psx: &mut Psx) {
    sync::resync(psx, SyncToken::Gpu);
    sync::set_next_event(psx, SyncToken::Gpu, FRAME_CYCLES);
}

/// Scheduler callback, called once per frame at the start of the vertical
/// blanking
pub fn run(psx: &mut Psx) {
    sync::resync(psx, SyncToken::Gpu);

    psx.video.frame = psx.video.frame.wrapping_add(1);
    psx.irq.trigger(Interrupt::VBlank);

    sync::set_next_event(psx, SyncToken::Gpu, FRAME_CYCLES);
}

/// Register read, `offset` is word aligned
pub fn load(psx: &mut Psx, offset: u32) -> u32 {
    match offset {
        0 => psx.gpu.read(),
        _ => psx.gpu.status(),
    }
}

pub fn store(psx: &mut Psx, offset: u32, val: u32) {
    match offset {
        0 => gp0(psx, val),
        _ => {
            psx.gpu.submit_control(val);
            // The DMA direction may have changed
            dma::refresh_cpu_halt(psx);
        }
    }
}

/// GP0 word from the CPU or the DMA
pub fn gp0(psx: &mut Psx, val: u32) {
    let irq_before = psx.gpu.status() & STATUS_IRQ != 0;

    psx.gpu.submit_primary(val);

    if !irq_before && psx.gpu.status() & STATUS_IRQ != 0 {
        psx.irq.trigger(Interrupt::Gpu);
    }
}
