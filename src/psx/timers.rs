//! The three 16bit root counters.
//!
//! Timers are only brought up to date when they're accessed or when the
//! next interrupt they can raise is due.

use super::irq::Interrupt;
use super::sync::{self, SyncToken};
use super::{CycleCount, Psx};

/// Clock periods are in CPU cycles, as 16.16 fixed point
const FRAC_SHIFT: u32 = 16;

/// System clock
const SYSCLK_PERIOD: u64 = 1 << FRAC_SHIFT;
/// System clock / 8
const SYSCLK_DIV8_PERIOD: u64 = 8 << FRAC_SHIFT;
/// NTSC dot clock in 320 pixel mode. The GPU runs at 11/7 times the CPU
/// frequency and outputs one pixel every 8 GPU cycles.
const DOTCLK_PERIOD: u64 = ((8 * 7) << FRAC_SHIFT) / 11;
/// NTSC line length: 3413 GPU cycles
const HBLANK_PERIOD: u64 = ((3413 * 7) << FRAC_SHIFT) / 11;

/// Mode register bits
const MODE_SYNC_ENABLE: u16 = 1 << 0;
const MODE_RESET_ON_TARGET: u16 = 1 << 3;
const MODE_IRQ_ON_TARGET: u16 = 1 << 4;
const MODE_IRQ_ON_OVERFLOW: u16 = 1 << 5;
const MODE_IRQ_REPEAT: u16 = 1 << 6;
const MODE_IRQ_TOGGLE: u16 = 1 << 7;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Clock {
    System,
    SystemDiv8,
    Dot,
    HBlank,
}

impl Clock {
    fn period(self) -> u64 {
        match self {
            Clock::System => SYSCLK_PERIOD,
            Clock::SystemDiv8 => SYSCLK_DIV8_PERIOD,
            Clock::Dot => DOTCLK_PERIOD,
            Clock::HBlank => HBLANK_PERIOD,
        }
    }
}

struct Timer {
    /// 0, 1 or 2
    which: usize,
    counter: u16,
    target: u16,
    /// Writeable part of the mode register, bits [9:0]
    mode: u16,
    /// Fractional part of the counter, in CPU cycles << FRAC_SHIFT
    phase: u64,
    /// Bit 10 of the mode register: 0 while an interrupt is signaled
    irq_line: bool,
    /// An interrupt has been raised since the mode was written
    irq_fired: bool,
    target_reached: bool,
    overflow_reached: bool,
    /// Unsupported sync mode already logged
    sync_warned: bool,
}

impl Timer {
    fn new(which: usize) -> Timer {
        Timer {
            which,
            counter: 0,
            target: 0,
            mode: 0,
            phase: 0,
            irq_line: true,
            irq_fired: false,
            target_reached: false,
            overflow_reached: false,
            sync_warned: false,
        }
    }

    fn interrupt(&self) -> Interrupt {
        match self.which {
            0 => Interrupt::Timer0,
            1 => Interrupt::Timer1,
            _ => Interrupt::Timer2,
        }
    }

    fn clock(&self) -> Clock {
        let source = (self.mode >> 8) & 3;

        match (self.which, source) {
            (0, 1) | (0, 3) => Clock::Dot,
            (1, 1) | (1, 3) => Clock::HBlank,
            (2, 2) | (2, 3) => Clock::SystemDiv8,
            _ => Clock::System,
        }
    }

    /// True if the counter is paused by its sync mode
    fn stopped(&mut self) -> bool {
        if self.mode & MODE_SYNC_ENABLE == 0 {
            return false;
        }

        let sync = (self.mode >> 1) & 3;

        if self.which == 2 {
            return sync == 0 || sync == 3;
        }

        if !self.sync_warned {
            warn!("Timer {} sync mode {} not implemented", self.which, sync);
            self.sync_warned = true;
        }

        false
    }

    fn set_mode(&mut self, val: u16) {
        self.mode = val & 0x3ff;
        self.counter = 0;
        self.phase = 0;
        self.irq_line = true;
        self.irq_fired = false;
        self.sync_warned = false;
    }

    /// Read the mode register. The reached flags are cleared by the read.
    fn read_mode(&mut self) -> u16 {
        let mode = self.mode
            | (u16::from(self.irq_line) << 10)
            | (u16::from(self.target_reached) << 11)
            | (u16::from(self.overflow_reached) << 12);

        self.target_reached = false;
        self.overflow_reached = false;

        mode
    }

    fn reset_on_target(&self) -> bool {
        self.mode & MODE_RESET_ON_TARGET != 0
    }

    /// Counter values in one wrap around
    fn wrap_period(&self) -> u32 {
        if self.reset_on_target() && self.target > 0 {
            u32::from(self.target)
        } else {
            0x1_0000
        }
    }

    /// Run for `cycles` CPU cycles. Returns true if an interrupt must be
    /// raised.
    fn run(&mut self, cycles: CycleCount) -> bool {
        if cycles <= 0 || self.stopped() {
            return false;
        }

        let period = self.clock().period();

        self.phase += (cycles as u64) << FRAC_SHIFT;
        let ticks = self.phase / period;
        self.phase %= period;

        self.advance(ticks as u32)
    }

    /// Count `ticks` clock edges
    fn advance(&mut self, mut ticks: u32) -> bool {
        let mut hit_target = false;
        let mut hit_overflow = false;

        while ticks > 0 {
            let counter = u32::from(self.counter);
            let target = u32::from(self.target);
            let wrap = self.wrap_period();

            if counter == 0 && ticks >= wrap {
                // Skip whole periods at once
                ticks %= wrap;
                hit_target |= self.reset_on_target() || target > 0;
                hit_overflow |= wrap == 0x1_0000;
                continue;
            }

            let to_target = if counter < target {
                target - counter
            } else {
                u32::MAX
            };
            let to_overflow = 0x1_0000 - counter;

            let step = ticks.min(to_target).min(to_overflow);
            let counter = counter + step;
            ticks -= step;

            if counter == target {
                hit_target = true;
                self.counter = if self.reset_on_target() {
                    0
                } else {
                    counter as u16
                };
            } else if counter == 0x1_0000 {
                hit_overflow = true;
                self.counter = 0;
            } else {
                self.counter = counter as u16;
            }
        }

        self.target_reached |= hit_target;
        self.overflow_reached |= hit_overflow;

        let irq = (hit_target && self.mode & MODE_IRQ_ON_TARGET != 0)
            || (hit_overflow && self.mode & MODE_IRQ_ON_OVERFLOW != 0);

        irq && self.signal_irq()
    }

    /// Returns true if the interrupt line goes active
    fn signal_irq(&mut self) -> bool {
        if self.irq_fired && self.mode & MODE_IRQ_REPEAT == 0 {
            // One-shot
            return false;
        }

        self.irq_fired = true;

        if self.mode & MODE_IRQ_TOGGLE != 0 {
            self.irq_line = !self.irq_line;
            !self.irq_line
        } else {
            // Short pulse, the line is back up by the time the CPU looks
            true
        }
    }

    /// Cycles until the next interrupt, if any
    fn next_irq(&mut self) -> Option<CycleCount> {
        if self.stopped() || (self.irq_fired && self.mode & MODE_IRQ_REPEAT == 0) {
            return None;
        }

        let counter = u32::from(self.counter);
        let target = u32::from(self.target);

        let to_target = if self.mode & MODE_IRQ_ON_TARGET == 0 {
            None
        } else if counter < target {
            Some(target - counter)
        } else if self.reset_on_target() && target > 0 {
            // Counter was set beyond target: overflow first
            Some(0x1_0000 - counter + target)
        } else {
            Some(0x1_0000 - counter + target.max(1))
        };

        let to_overflow = if self.mode & MODE_IRQ_ON_OVERFLOW != 0
            && !(self.reset_on_target() && target > 0 && counter < target)
        {
            Some(0x1_0000 - counter)
        } else {
            None
        };

        let ticks = match (to_target, to_overflow) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return None,
        };

        let period = self.clock().period();
        let fixed = u64::from(ticks) * period - self.phase;
        let cycles = (fixed + (1 << FRAC_SHIFT) - 1) >> FRAC_SHIFT;

        Some(cycles.min(CycleCount::MAX as u64) as CycleCount)
    }
}

pub struct Timers {
    timers: [Timer; 3],
}

impl Timers {
    pub fn new() -> Timers {
        Timers {
            timers: [Timer::new(0), Timer::new(1), Timer::new(2)],
        }
    }

    /// Current counter value of timer `which`, without resynchronizing.
    /// `None` if there's no such timer.
    pub fn counter(&self, which: usize) -> Option<u16> {
        self.timers.get(which).map(|t| t.counter)
    }
}

/// Register read, `offset` is word aligned
pub fn load(psx: &mut Psx, offset: u32) -> u32 {
    catch_up(psx);

    let which = (offset >> 4) as usize;

    let timer = match psx.timers.timers.get_mut(which) {
        Some(t) => t,
        None => {
            warn!("Unhandled timer load at offset 0x{:x}", offset);
            return 0;
        }
    };

    match offset & 0xf {
        0 => u32::from(timer.counter),
        4 => u32::from(timer.read_mode()),
        8 => u32::from(timer.target),
        _ => {
            warn!("Unhandled timer {} load at offset 0x{:x}", which, offset);
            0
        }
    }
}

pub fn store(psx: &mut Psx, offset: u32, val: u32) {
    catch_up(psx);

    let which = (offset >> 4) as usize;

    match psx.timers.timers.get_mut(which) {
        Some(timer) => match offset & 0xf {
            0 => timer.counter = val as u16,
            4 => timer.set_mode(val as u16),
            8 => timer.target = val as u16,
            _ => warn!(
                "Unhandled timer {} store at offset 0x{:x}: 0x{:x}",
                which, offset, val
            ),
        },
        None => warn!("Unhandled timer store at offset 0x{:x}: 0x{:x}", offset, val),
    }

    predict_next_irq(psx);
}

/// Scheduler callback
pub fn run(psx: &mut Psx) {
    catch_up(psx);
    predict_next_irq(psx);
}

fn catch_up(psx: &mut Psx) {
    let elapsed = sync::resync(psx, SyncToken::Timers);

    for i in 0..3 {
        let timer = &mut psx.timers.timers[i];

        if timer.run(elapsed) {
            let it = timer.interrupt();
            psx.irq.trigger(it);
        }
    }
}

fn predict_next_irq(psx: &mut Psx) {
    let next = psx
        .timers
        .timers
        .iter_mut()
        .filter_map(|t| t.next_irq())
        .min();

    match next {
        Some(delay) => sync::set_next_event(psx, SyncToken::Timers, delay.max(1)),
        None => sync::no_next_event(psx, SyncToken::Timers),
    }
}
