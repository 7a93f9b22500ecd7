//! DMA engine: seven channels moving words between RAM and the peripherals.
//!
//! Transfers that don't use chopping run to completion inside the register
//! store that starts them, the CPU is then stalled for the duration of the
//! transfer. Chopped transfers and request transfers waiting on their port
//! are paced by the `Dma` synchronization token.

use super::irq::Interrupt;
use super::sync::{self, SyncToken};
use super::{gpu, CycleCount, Psx};
use crate::error::{PsxError, Result};

/// Period at which a request transfer blocked by its port checks it again
const DMA_REFRESH_PERIOD: CycleCount = 128;

/// Number of linked list nodes after which we consider that the list loops
const LINKED_LIST_MAX_NODES: u32 = 0x8_0000;

/// Bit 23 of a linked list pointer marks the end of the list
const LINKED_LIST_END: u32 = 0x80_0000;

/// Channel control bits
const CONTROL_FROM_RAM: u32 = 1 << 0;
const CONTROL_BACKWARDS: u32 = 1 << 1;
const CONTROL_CHOPPING: u32 = 1 << 8;
const CONTROL_ENABLE: u32 = 1 << 24;
const CONTROL_TRIGGER: u32 = 1 << 28;

/// The OTC channel only has its enable, trigger and one unknown bit
/// writeable
const OTC_CONTROL_MASK: u32 = CONTROL_ENABLE | CONTROL_TRIGGER | (1 << 30);

/// The 7 DMA ports
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Port {
    /// Macroblock decoder input
    MdecIn = 0,
    /// Macroblock decoder output
    MdecOut = 1,
    Gpu = 2,
    CdRom = 3,
    Spu = 4,
    /// Extension port
    Pio = 5,
    /// Used to clear the ordering table in RAM
    Otc = 6,
}

impl Port {
    pub const ALL: [Port; 7] = [
        Port::MdecIn,
        Port::MdecOut,
        Port::Gpu,
        Port::CdRom,
        Port::Spu,
        Port::Pio,
        Port::Otc,
    ];

    fn from_index(index: u32) -> Option<Port> {
        Port::ALL.get(index as usize).copied()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    ToRam,
    FromRam,
}

/// DMA transfer synchronization mode
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sync {
    /// Transfer starts when the CPU sets the trigger bit and happens all at
    /// once
    Manual,
    /// Sync blocks to DMA requests
    Request,
    /// Used to transfer GPU command lists
    LinkedList,
}

/// Per-channel data
pub struct Channel {
    control: u32,
    sync: Sync,
    base: u32,
    block_size: u16,
    block_count: u16,
    /// Address of the next word of the running transfer
    cur_addr: u32,
    /// Words left in the current block or linked list node
    remaining_words: u32,
    /// Blocks left, including the current one
    remaining_blocks: u32,
    /// Header address of the next linked list node
    next_node: u32,
    /// Number of linked list nodes visited so far
    nodes: u32,
    /// Cycles until the channel needs to run again
    clock_counter: CycleCount,
}

impl Channel {
    fn new() -> Channel {
        Channel {
            control: 0,
            sync: Sync::Manual,
            base: 0,
            block_size: 0,
            block_count: 0,
            cur_addr: 0,
            remaining_words: 0,
            remaining_blocks: 0,
            next_node: 0,
            nodes: 0,
            clock_counter: 0,
        }
    }

    pub fn control(&self) -> u32 {
        self.control
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn block_control(&self) -> u32 {
        u32::from(self.block_size) | (u32::from(self.block_count) << 16)
    }

    pub fn sync(&self) -> Sync {
        self.sync
    }

    pub fn direction(&self) -> Direction {
        if self.control & CONTROL_FROM_RAM != 0 {
            Direction::FromRam
        } else {
            Direction::ToRam
        }
    }

    fn backwards(&self) -> bool {
        self.control & CONTROL_BACKWARDS != 0
    }

    fn chopping(&self) -> bool {
        self.control & CONTROL_CHOPPING != 0
    }

    /// Words transferred per chopped burst
    fn dma_window(&self) -> u32 {
        1 << ((self.control >> 16) & 7)
    }

    /// Cycles left to the CPU between two chopped bursts
    fn cpu_window(&self) -> CycleCount {
        1 << ((self.control >> 20) & 7)
    }

    fn enabled(&self) -> bool {
        self.control & CONTROL_ENABLE != 0
    }

    fn triggered(&self) -> bool {
        self.control & CONTROL_TRIGGER != 0
    }

    /// Manual transfers need the trigger bit, the others only the enable
    pub fn active(&self) -> bool {
        self.enabled() && (self.sync != Sync::Manual || self.triggered())
    }

    /// Block length in words, 0 means 0x10000
    fn block_len(len: u16) -> u32 {
        match len {
            0 => 0x1_0000,
            n => u32::from(n),
        }
    }
}

/// DMA interrupt register
struct InterruptControl {
    /// Bits [5:0], purpose unknown
    unknown: u8,
    force: bool,
    channel_enable: u8,
    master_enable: bool,
    channel_flags: u8,
    master_flag: bool,
}

impl InterruptControl {
    fn new() -> InterruptControl {
        InterruptControl {
            unknown: 0,
            force: false,
            channel_enable: 0,
            master_enable: false,
            channel_flags: 0,
            master_flag: false,
        }
    }

    fn to_u32(&self) -> u32 {
        u32::from(self.unknown)
            | (u32::from(self.force) << 15)
            | (u32::from(self.channel_enable) << 16)
            | (u32::from(self.master_enable) << 23)
            | (u32::from(self.channel_flags) << 24)
            | (u32::from(self.master_flag) << 31)
    }

    /// Returns true on a rising edge of the master flag
    fn store(&mut self, val: u32) -> bool {
        self.unknown = (val & 0x3f) as u8;
        self.force = val & (1 << 15) != 0;
        self.channel_enable = ((val >> 16) & 0x7f) as u8;
        self.master_enable = val & (1 << 23) != 0;

        // Writing 1 to a flag acknowledges it
        let ack = ((val >> 24) & 0x7f) as u8;
        self.channel_flags &= !ack;

        self.refresh()
    }

    /// Latch the flag of `port` if its interrupt is enabled
    fn channel_done(&mut self, port: Port) -> bool {
        let bit = 1 << (port as u8);

        if self.channel_enable & bit != 0 {
            self.channel_flags |= bit;
        }

        self.refresh()
    }

    fn refresh(&mut self) -> bool {
        let prev = self.master_flag;

        self.master_flag =
            self.force || (self.master_enable && (self.channel_flags & self.channel_enable) != 0);

        !prev && self.master_flag
    }
}

pub struct Dma {
    /// Control register, contains the priority and enable bits of each port.
    /// Stored and read back, priorities aren't emulated.
    control: u32,
    irq: InterruptControl,
    channels: [Channel; 7],
    /// True while a non-chopped manual channel is enabled
    cpu_stalled: bool,
    /// Extra CPU stall while the GPU request channel runs
    timing_penalty: CycleCount,
}

impl Dma {
    pub fn new() -> Dma {
        Dma {
            control: 0x0765_4321,
            irq: InterruptControl::new(),
            channels: [
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
            ],
            cpu_stalled: false,
            timing_penalty: 0,
        }
    }

    pub fn channel(&self, port: Port) -> &Channel {
        &self.channels[port as usize]
    }

    fn channel_mut(&mut self, port: Port) -> &mut Channel {
        &mut self.channels[port as usize]
    }

    pub fn control(&self) -> u32 {
        self.control
    }

    pub fn interrupt(&self) -> u32 {
        self.irq.to_u32()
    }

    pub fn cpu_stalled(&self) -> bool {
        self.cpu_stalled
    }

    pub fn timing_penalty(&self) -> CycleCount {
        self.timing_penalty
    }
}

/// Register read, `offset` is word aligned
pub fn load(psx: &mut Psx, offset: u32) -> u32 {
    let major = offset >> 4;
    let minor = offset & 0xf;

    if let Some(port) = Port::from_index(major) {
        let channel = psx.dma.channel(port);

        match minor {
            0 => channel.base(),
            4 => channel.block_control(),
            8 => channel.control(),
            _ => {
                warn!("Unhandled DMA load from {:?} +0x{:x}", port, minor);
                0
            }
        }
    } else {
        match minor {
            0 => psx.dma.control,
            4 => psx.dma.irq.to_u32(),
            _ => {
                warn!("Unhandled DMA load at offset 0x{:x}", offset);
                0
            }
        }
    }
}

/// Register write. Enabling a channel can run a complete transfer before
/// returning.
pub fn store(psx: &mut Psx, offset: u32, val: u32) -> Result<()> {
    let major = offset >> 4;
    let minor = offset & 0xf;

    if let Some(port) = Port::from_index(major) {
        let channel = psx.dma.channel_mut(port);

        match minor {
            0 => channel.base = val & 0xff_ffff,
            4 => {
                channel.block_size = val as u16;
                channel.block_count = (val >> 16) as u16;
            }
            8 => return set_channel_control(psx, port, val),
            _ => warn!(
                "Unhandled DMA store to {:?} +0x{:x}: 0x{:08x}",
                port, minor, val
            ),
        }
    } else {
        match minor {
            0 => psx.dma.control = val,
            4 => {
                if psx.dma.irq.store(val) {
                    psx.irq.trigger(Interrupt::Dma);
                }
            }
            _ => warn!("Unhandled DMA store at offset 0x{:x}: 0x{:08x}", offset, val),
        }
    }

    Ok(())
}

fn set_channel_control(psx: &mut Psx, port: Port, val: u32) -> Result<()> {
    let val = match port {
        Port::Otc => (val & OTC_CONTROL_MASK) | CONTROL_BACKWARDS,
        _ => val,
    };

    let sync = match (val >> 9) & 3 {
        0 => Sync::Manual,
        1 => Sync::Request,
        2 => Sync::LinkedList,
        _ => return Err(PsxError::BadDmaSync { port, control: val }),
    };

    let channel = psx.dma.channel_mut(port);

    let was_active = channel.active();

    channel.control = val;
    channel.sync = sync;

    let active = channel.active();

    refresh_cpu_halt(psx);

    if active && !was_active {
        start(psx, port)
    } else {
        if was_active && !active {
            debug!("DMA {:?} stopped by software", port);
            catch_up(psx);
            schedule(psx);
        }
        Ok(())
    }
}

/// Recompute whether the CPU is halted by a channel and the GPU request
/// transfer penalty
pub fn refresh_cpu_halt(psx: &mut Psx) {
    let halt = psx
        .dma
        .channels
        .iter()
        .any(|c| c.enabled() && !c.chopping() && c.sync == Sync::Manual);

    let mut penalty = 0;

    if !halt {
        let gpu = psx.dma.channel(Port::Gpu);

        let stalled = gpu.enabled()
            && !gpu.chopping()
            && gpu.sync == Sync::Request
            && gpu.block_size > 0
            && can_run(psx, Port::Gpu);

        if stalled {
            penalty = CycleCount::from(gpu.block_size - 1).min(200);
        }
    }

    psx.dma.cpu_stalled = halt;
    psx.dma.timing_penalty = penalty;
}

/// True if `port` is ready to take part in a transfer in the channel's
/// direction
fn can_run(psx: &Psx, port: Port) -> bool {
    match (port, psx.dma.channel(port).direction()) {
        (Port::Gpu, Direction::FromRam) => psx.gpu.dma_can_write(),
        _ => true,
    }
}

/// DMA addresses are word aligned and wrap around the installed RAM
fn addr_mask(psx: &Psx) -> u32 {
    psx.ram.offset_mask() & !3
}

/// Set up the transfer of a channel that just became active
fn start(psx: &mut Psx, port: Port) -> Result<()> {
    let mask = addr_mask(psx);
    let channel = psx.dma.channel_mut(port);

    channel.cur_addr = channel.base & mask;
    channel.clock_counter = 0;

    match channel.sync {
        Sync::Manual => {
            channel.remaining_words = Channel::block_len(channel.block_size);
            channel.remaining_blocks = 1;
        }
        Sync::Request => {
            channel.remaining_words = Channel::block_len(channel.block_size);
            channel.remaining_blocks = Channel::block_len(channel.block_count);
        }
        Sync::LinkedList => {
            if channel.direction() == Direction::ToRam {
                return Err(PsxError::BadDmaDirection { port });
            }

            channel.remaining_words = 0;
            channel.remaining_blocks = 0;
            channel.next_node = channel.base & mask;
            channel.nodes = 0;
        }
    }

    let chopping = channel.chopping();
    let sync = channel.sync;

    debug!(
        "DMA {:?} start: {:?} {:?} base 0x{:06x}",
        port,
        sync,
        channel.direction(),
        channel.base
    );

    if chopping || (sync == Sync::Request && !can_run(psx, port)) {
        // The first burst happens on the next scheduler run
        catch_up(psx);
        schedule(psx);
        return Ok(());
    }

    let penalty = psx.dma.timing_penalty;

    let words = transfer(psx, port, u32::MAX)?;

    // The triggering store has already been charged, the stall comes after
    psx.tick(words as CycleCount + penalty);

    if psx.dma.channel(port).active() {
        // Request transfer blocked by the port
        catch_up(psx);
        psx.dma.channel_mut(port).clock_counter = DMA_REFRESH_PERIOD;
        schedule(psx);
    }

    Ok(())
}

/// Scheduler callback
pub fn run(psx: &mut Psx) -> Result<()> {
    catch_up(psx);

    for &port in Port::ALL.iter() {
        let channel = psx.dma.channel(port);

        if !channel.active() || channel.clock_counter > 0 {
            continue;
        }

        let chopping = channel.chopping();
        let dma_window = channel.dma_window();
        let cpu_window = channel.cpu_window();

        if !can_run(psx, port) {
            psx.dma.channel_mut(port).clock_counter = DMA_REFRESH_PERIOD;
            continue;
        }

        let burst = if chopping { dma_window } else { u32::MAX };

        let words = transfer(psx, port, burst)?;

        // The bus is held during the burst
        psx.tick(words as CycleCount);

        psx.dma.channel_mut(port).clock_counter = if chopping {
            cpu_window
        } else {
            DMA_REFRESH_PERIOD
        };
    }

    // Time spent in bursts doesn't count towards the other channels' wait
    sync::resync(psx, SyncToken::Dma);

    schedule(psx);

    Ok(())
}

/// Account for the time elapsed since the last synchronization in the
/// counters of the channels waiting to run
fn catch_up(psx: &mut Psx) {
    let elapsed = sync::resync(psx, SyncToken::Dma);

    for channel in psx.dma.channels.iter_mut().filter(|c| c.active()) {
        channel.clock_counter -= elapsed;
    }
}

/// Arm the `Dma` token for the channel that needs to run first
fn schedule(psx: &mut Psx) {
    let next = psx
        .dma
        .channels
        .iter()
        .filter(|c| c.active())
        .map(|c| c.clock_counter)
        .min();

    match next {
        Some(delay) => sync::set_next_event(psx, SyncToken::Dma, delay.max(1)),
        None => sync::no_next_event(psx, SyncToken::Dma),
    }
}

/// Move up to `max_words` words. Returns the number of bus cycles used.
/// Linked list headers count as one word.
fn transfer(psx: &mut Psx, port: Port, max_words: u32) -> Result<u32> {
    let mut words = 0;

    while words < max_words {
        if psx.dma.channel(port).remaining_words == 0 {
            if !next_block(psx, port)? {
                break;
            }

            if psx.dma.channel(port).sync == Sync::LinkedList {
                // Header read
                words += 1;
                continue;
            }
        }

        let mask = addr_mask(psx);
        let channel = psx.dma.channel_mut(port);

        let addr = channel.cur_addr;
        let last = channel.remaining_words == 1 && channel.remaining_blocks <= 1;
        let direction = channel.direction();

        let step = match channel.sync {
            Sync::LinkedList => 4,
            _ if channel.backwards() => 4u32.wrapping_neg(),
            _ => 4,
        };

        channel.cur_addr = channel.cur_addr.wrapping_add(step) & mask;
        channel.remaining_words -= 1;

        match direction {
            Direction::FromRam => {
                let v = psx.ram.load::<u32>(addr);
                port_write(psx, port, v);
            }
            Direction::ToRam => {
                let v = port_read(psx, port, addr, last);
                psx.ram.store(addr, v);
            }
        }

        words += 1;
    }

    Ok(words)
}

/// Called when the current block is exhausted: either set up the next one or
/// end the transfer. Returns false once the transfer is over or blocked.
fn next_block(psx: &mut Psx, port: Port) -> Result<bool> {
    let mask = addr_mask(psx);
    let channel = psx.dma.channel_mut(port);

    match channel.sync {
        Sync::LinkedList => {
            if channel.nodes > 0 && channel.next_node & LINKED_LIST_END != 0 {
                finish(psx, port);
                return Ok(false);
            }

            if channel.nodes >= LINKED_LIST_MAX_NODES {
                return Err(PsxError::DmaLinkedListLoop {
                    port,
                    addr: channel.next_node,
                });
            }

            let node = channel.next_node & mask;
            let header = psx.ram.load::<u32>(node);

            let channel = psx.dma.channel_mut(port);

            channel.nodes += 1;
            channel.cur_addr = node.wrapping_add(4) & mask;
            channel.remaining_words = header >> 24;
            channel.next_node = header & 0xff_ffff;

            Ok(true)
        }
        _ => {
            channel.remaining_blocks = channel.remaining_blocks.saturating_sub(1);

            if channel.remaining_blocks == 0 {
                finish(psx, port);
                return Ok(false);
            }

            channel.remaining_words = Channel::block_len(channel.block_size);

            // The base address register follows request transfers
            channel.base = channel.cur_addr;
            channel.block_count = channel.remaining_blocks as u16;

            Ok(can_run(psx, port))
        }
    }
}

/// End of transfer: clear enable and trigger and signal the interrupt
fn finish(psx: &mut Psx, port: Port) {
    let channel = psx.dma.channel_mut(port);

    channel.control &= !(CONTROL_ENABLE | CONTROL_TRIGGER);

    match channel.sync {
        Sync::Request => {
            channel.base = channel.cur_addr;
            channel.block_count = 0;
        }
        Sync::LinkedList => channel.base = channel.next_node,
        Sync::Manual => (),
    }

    debug!("DMA {:?} done", port);

    refresh_cpu_halt(psx);

    if psx.dma.irq.channel_done(port) {
        psx.irq.trigger(Interrupt::Dma);
    }
}

fn port_write(psx: &mut Psx, port: Port, val: u32) {
    match port {
        Port::Gpu => gpu::gp0(psx, val),
        _ => trace!("DMA {:?} write 0x{:08x} ignored", port, val),
    }
}

/// Read a word from `port`. `addr` is the RAM destination and `last` is set
/// for the final word of the transfer.
fn port_read(psx: &mut Psx, port: Port, addr: u32, last: bool) -> u32 {
    match port {
        Port::Otc => {
            if last {
                // Last entry contains the end of table marker
                0xff_ffff
            } else {
                // Pointer to the previous entry
                addr.wrapping_sub(4) & addr_mask(psx)
            }
        }
        Port::Gpu => psx.gpu.read(),
        _ => 0,
    }
}
