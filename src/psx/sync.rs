//! Lazy synchronization of the peripherals with the CPU.
//!
//! Peripherals aren't stepped along with the CPU. Each one remembers the date
//! it was last brought up to date and catches up (`resync`) when it's
//! accessed or when the event it scheduled with `set_next_event` is due.
//! The CPU only has to compare its counter with `first_event` after each
//! instruction.

use super::{dma, gpu, timers, CycleCount, Psx};
use crate::error::Result;

/// Peripherals that take part in the synchronization
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncToken {
    Dma = 0,
    Timers,
    Gpu,
}

impl SyncToken {
    pub const ALL: [SyncToken; NUM_TOKENS] = [SyncToken::Dma, SyncToken::Timers, SyncToken::Gpu];
}

const NUM_TOKENS: usize = 3;

/// Date used for tokens that have nothing scheduled
const NEVER: CycleCount = CycleCount::MAX;

/// Counter value above which `handle_events` rebases every date in the
/// system
pub const REBASE_THRESHOLD: CycleCount = 0x1000_0000;

pub struct Synchronizer {
    /// Date of the last synchronization for each token
    last_sync: [CycleCount; NUM_TOKENS],
    /// Date of the next event for each token
    next_event: [CycleCount; NUM_TOKENS],
    /// Closest date in `next_event`
    first_event: CycleCount,
}

impl Synchronizer {
    pub fn new() -> Synchronizer {
        Synchronizer {
            last_sync: [0; NUM_TOKENS],
            next_event: [NEVER; NUM_TOKENS],
            first_event: NEVER,
        }
    }

    fn refresh_first_event(&mut self) {
        self.first_event = self.next_event.iter().copied().min().unwrap_or(NEVER);
    }

    pub fn first_event(&self) -> CycleCount {
        self.first_event
    }

    pub fn next_event(&self, token: SyncToken) -> CycleCount {
        self.next_event[token as usize]
    }

    pub fn last_sync(&self, token: SyncToken) -> CycleCount {
        self.last_sync[token as usize]
    }
}

/// Bring `token` up to date: return the number of cycles elapsed since its
/// last synchronization and record the current date
pub fn resync(psx: &mut Psx, token: SyncToken) -> CycleCount {
    let last = &mut psx.sync.last_sync[token as usize];

    let elapsed = psx.cycle_counter - *last;

    if elapsed <= 0 {
        // A peripheral can be synchronized several times at the same date
        return 0;
    }

    *last = psx.cycle_counter;

    elapsed
}

/// Schedule the next event for `token` `delay` cycles from now
pub fn set_next_event(psx: &mut Psx, token: SyncToken, delay: CycleCount) {
    psx.sync.next_event[token as usize] = psx.cycle_counter + delay;
    psx.sync.refresh_first_event();
}

/// Cancel any event scheduled for `token`
pub fn no_next_event(psx: &mut Psx, token: SyncToken) {
    psx.sync.next_event[token as usize] = NEVER;
    psx.sync.refresh_first_event();
}

/// True if the CPU reached the date of the earliest scheduled event
pub fn is_event_pending(psx: &Psx) -> bool {
    psx.cycle_counter >= psx.sync.first_event
}

/// Dispatch every due event. While a handler runs the counter is rewound to
/// the exact date of the event so that the peripheral doesn't see the cycles
/// the CPU ran past it.
pub fn handle_events(psx: &mut Psx) -> Result<()> {
    while is_event_pending(psx) {
        let event_date = psx.sync.first_event;
        let overshoot = psx.cycle_counter - event_date;

        psx.cycle_counter = event_date;

        for &token in SyncToken::ALL.iter() {
            if psx.sync.next_event[token as usize] > event_date {
                continue;
            }

            // Handlers re-arm their token if they need to
            psx.sync.next_event[token as usize] = NEVER;

            match token {
                SyncToken::Dma => dma::run(psx)?,
                SyncToken::Timers => timers::run(psx),
                SyncToken::Gpu => gpu::run(psx),
            }
        }

        psx.sync.refresh_first_event();
        psx.cycle_counter += overshoot;
    }

    if psx.cycle_counter >= REBASE_THRESHOLD {
        rebase_counters(psx);
    }

    Ok(())
}

/// Subtract the current date from every timestamp in the system and reset
/// the counter to 0
pub fn rebase_counters(psx: &mut Psx) {
    let now = psx.cycle_counter;

    for i in 0..NUM_TOKENS {
        psx.sync.last_sync[i] -= now;

        if psx.sync.next_event[i] != NEVER {
            psx.sync.next_event[i] -= now;
        }
    }

    psx.sync.refresh_first_event();
    psx.cpu.rebase_counters(now);
    psx.cycle_counter = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psx::bios::Bios;
    use crate::Config;

    fn psx() -> Psx {
        let mut psx = Psx::new(Bios::new_dummy(), &Config::default()).unwrap();

        for &token in SyncToken::ALL.iter() {
            no_next_event(&mut psx, token);
        }

        psx
    }

    #[test]
    fn first_event_is_the_earliest() {
        let mut psx = psx();

        psx.cycle_counter = 100;
        set_next_event(&mut psx, SyncToken::Timers, 500);
        set_next_event(&mut psx, SyncToken::Dma, 50);

        assert_eq!(psx.sync.first_event(), 150);

        no_next_event(&mut psx, SyncToken::Dma);
        assert_eq!(psx.sync.first_event(), 600);
    }

    #[test]
    fn event_pending_at_the_due_date() {
        let mut psx = psx();

        set_next_event(&mut psx, SyncToken::Timers, 10);
        assert!(!is_event_pending(&psx));

        psx.tick(9);
        assert!(!is_event_pending(&psx));

        psx.tick(1);
        assert!(is_event_pending(&psx));
    }

    #[test]
    fn resync_reports_elapsed_once() {
        let mut psx = psx();

        psx.tick(42);
        assert_eq!(resync(&mut psx, SyncToken::Dma), 42);
        assert_eq!(resync(&mut psx, SyncToken::Dma), 0);

        psx.tick(8);
        assert_eq!(resync(&mut psx, SyncToken::Dma), 8);
        assert_eq!(psx.sync.last_sync(SyncToken::Dma), 50);
    }

    #[test]
    fn rebase_keeps_relative_dates() {
        let mut psx = psx();

        psx.tick(1000);
        resync(&mut psx, SyncToken::Timers);
        psx.tick(500);
        set_next_event(&mut psx, SyncToken::Timers, 300);

        rebase_counters(&mut psx);

        assert_eq!(psx.cycle_counter, 0);
        assert_eq!(psx.sync.last_sync(SyncToken::Timers), -500);
        assert_eq!(psx.sync.next_event(SyncToken::Timers), 300);
        assert_eq!(psx.sync.first_event(), 300);
        assert_eq!(psx.sync.next_event(SyncToken::Dma), NEVER);

        psx.tick(10);
        assert_eq!(resync(&mut psx, SyncToken::Timers), 510);
    }

    #[test]
    fn events_rebase_counters_past_threshold() {
        let mut psx = psx();

        psx.tick(REBASE_THRESHOLD - 2);
        set_next_event(&mut psx, SyncToken::Dma, 5);
        set_next_event(&mut psx, SyncToken::Timers, 1000);
        psx.tick(10);

        handle_events(&mut psx).unwrap();

        // The DMA handler ran at the event date, 5 cycles ago
        assert_eq!(psx.cycle_counter, 0);
        assert_eq!(psx.sync.last_sync(SyncToken::Dma), -5);
        assert_eq!(psx.sync.next_event(SyncToken::Timers), 1000 - 8);
        assert_eq!(psx.sync.first_event(), 1000 - 8);
    }

    #[test]
    fn handled_event_is_parked() {
        let mut psx = psx();

        set_next_event(&mut psx, SyncToken::Dma, 5);
        psx.tick(7);

        // No DMA channel is active, the handler doesn't re-arm
        handle_events(&mut psx).unwrap();

        assert_eq!(psx.cycle_counter, 7);
        assert_eq!(psx.sync.next_event(SyncToken::Dma), NEVER);
        assert!(!is_event_pending(&psx));
    }
}
