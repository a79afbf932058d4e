//! # Sensor Acquisition Module
//!
//! Collects one [`RawSample`] per acquisition tick from the two sensor
//! families on the console.
//!
//! This module handles:
//! - Reading the accelerator, brake and clutch pedals from the 12-bit ADC
//! - Reading both tiller force sensors in one lock-step transaction
//! - Holding the last tiller readings while the force sensors are converting
//! - Waiting for the first good force sensor conversion at startup

pub mod hx710c;

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use tracing::{debug, warn};

use crate::controls::types::{RawSample, PEDAL_RAW_MAX};
use crate::error::Result;
use crate::hal::{CriticalSection, PedalAdc, PedalChannel};
use hx710c::{Hx710c, Hx710cError};

/// Delay between readiness checks while waiting for the first conversion.
pub const DEFAULT_PRIME_POLL: Duration = Duration::from_millis(5);

/// Left and right tiller force sensors.
pub trait ForceSensor {
    /// Returns `[left, right]` or `None` while a conversion is still running.
    fn read_tillers<C: CriticalSection>(
        &mut self,
        cs: &C,
    ) -> std::result::Result<Option<[i32; 2]>, Hx710cError>;
}

impl<CLK, DATA, D> ForceSensor for Hx710c<CLK, DATA, D, 2>
where
    CLK: OutputPin,
    DATA: InputPin,
    D: DelayNs,
{
    fn read_tillers<C: CriticalSection>(
        &mut self,
        cs: &C,
    ) -> std::result::Result<Option<[i32; 2]>, Hx710cError> {
        self.read(cs)
    }
}

/// One acquisition tick's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub sample: RawSample,
    /// False when the tiller values were carried over from an earlier tick.
    pub force_fresh: bool,
}

/// Assembles raw samples from the pedal ADC and the tiller force sensors.
#[derive(Debug)]
pub struct Acquisition<S, A, C> {
    force: S,
    adc: A,
    cs: C,
    tillers: [i32; 2],
}

impl<S, A, C> Acquisition<S, A, C>
where
    S: ForceSensor,
    A: PedalAdc,
    C: CriticalSection,
{
    /// Creates an acquisition stage. Tillers read 0 until the first conversion.
    #[must_use]
    pub fn new(force: S, adc: A, cs: C) -> Self {
        Self {
            force,
            adc,
            cs,
            tillers: [0, 0],
        }
    }

    /// Polls the force sensors until both have produced a conversion.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor bus fails.
    pub async fn prime(&mut self, poll: Duration) -> Result<()> {
        while !self.refresh_tillers()? {
            tokio::time::sleep(poll).await;
        }
        debug!("Force sensors ready: {:?}", self.tillers);
        Ok(())
    }

    /// Reads every channel once.
    ///
    /// # Errors
    ///
    /// Returns an error if the ADC or the sensor bus fails.
    pub fn sample(&mut self) -> Result<Acquired> {
        let accelerator = self.read_pedal(PedalChannel::Accelerator)?;
        let brake = self.read_pedal(PedalChannel::Brake)?;
        let clutch = self.read_pedal(PedalChannel::Clutch)?;

        let force_fresh = self.refresh_tillers()?;
        if !force_fresh {
            debug!("Force sensor not ready, keeping previous tiller readings");
        }

        Ok(Acquired {
            sample: RawSample {
                accelerator,
                brake,
                clutch,
                left_tiller: self.tillers[0],
                right_tiller: self.tillers[1],
            },
            force_fresh,
        })
    }

    /// Over-range codes saturate at the released end of the pedal travel.
    fn read_pedal(&mut self, channel: PedalChannel) -> Result<u16> {
        self.adc.select_input(channel)?;
        let code = self.adc.read()?;
        if code > PEDAL_RAW_MAX {
            warn!("Pedal {:?} code {:#06X} out of range", channel, code);
        }
        Ok(code.min(PEDAL_RAW_MAX))
    }

    fn refresh_tillers(&mut self) -> Result<bool> {
        match self.force.read_tillers(&self.cs)? {
            Some(tillers) => {
                self.tillers = tillers;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{NoDelay, SimForceBus, SimPedals};
    use crate::controls::conditioner::normalize;
    use crate::controls::mapper::map;
    use crate::controls::types::{CalibrationBounds, ControlSettings};
    use crate::hal::{MockPedalAdc, SchedulerSuspend};
    use mockall::predicate::eq;
    use mockall::Sequence;

    type BenchSensor = Hx710c<crate::bench::SimClockPin, crate::bench::SimDataPin, NoDelay, 2>;

    fn bench_sensor(bus: &SimForceBus, cs: &SchedulerSuspend) -> BenchSensor {
        Hx710c::new(bus.clock_pin(), [bus.data_pin(0), bus.data_pin(1)], NoDelay, cs).unwrap()
    }

    #[test]
    fn test_sample_reads_all_channels() {
        let bus = SimForceBus::new(2);
        let cs = SchedulerSuspend::new();
        let pedals = SimPedals::new();
        pedals.set(PedalChannel::Accelerator, 1000);
        pedals.set(PedalChannel::Brake, 2000);
        pedals.set(PedalChannel::Clutch, 3000);

        let mut acquisition = Acquisition::new(bench_sensor(&bus, &cs), pedals.adc(), cs);
        bus.latch(&[-500, 600]);

        let acquired = acquisition.sample().unwrap();

        assert!(acquired.force_fresh);
        assert_eq!(
            acquired.sample,
            RawSample {
                accelerator: 1000,
                brake: 2000,
                clutch: 3000,
                left_tiller: -500,
                right_tiller: 600,
            }
        );
    }

    #[test]
    fn test_not_ready_keeps_previous_tillers() {
        let bus = SimForceBus::new(2);
        let cs = SchedulerSuspend::new();
        let pedals = SimPedals::new();
        let mut acquisition = Acquisition::new(bench_sensor(&bus, &cs), pedals.adc(), cs.clone());

        bus.latch(&[11, 22]);
        acquisition.sample().unwrap();
        let sections = cs.sections_entered();

        pedals.set(PedalChannel::Accelerator, 77);
        let acquired = acquisition.sample().unwrap();

        assert!(!acquired.force_fresh);
        assert_eq!(acquired.sample.left_tiller, 11);
        assert_eq!(acquired.sample.right_tiller, 22);
        assert_eq!(acquired.sample.accelerator, 77);
        assert_eq!(cs.sections_entered(), sections);
    }

    #[test]
    fn test_over_range_pedal_codes_saturate() {
        let bus = SimForceBus::new(2);
        let cs = SchedulerSuspend::new();
        let mut adc = MockPedalAdc::new();
        let mut seq = Sequence::new();

        for (channel, code) in [
            (PedalChannel::Accelerator, 0xF123),
            (PedalChannel::Brake, 0x0FFF),
            (PedalChannel::Clutch, 0x1000),
        ] {
            adc.expect_select_input()
                .with(eq(channel))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
            adc.expect_read()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move || Ok(code));
        }

        let mut acquisition = Acquisition::new(bench_sensor(&bus, &cs), adc, cs);
        let sample = acquisition.sample().unwrap().sample;

        assert_eq!(sample.accelerator, PEDAL_RAW_MAX);
        assert_eq!(sample.brake, 0xFFF);
        assert_eq!(sample.clutch, PEDAL_RAW_MAX);
    }

    #[test]
    fn test_over_range_accelerator_gives_no_throttle() {
        let bus = SimForceBus::new(2);
        let cs = SchedulerSuspend::new();
        let mut adc = MockPedalAdc::new();
        adc.expect_select_input().returning(|_| Ok(()));
        adc.expect_read().returning(|| Ok(0x1000));

        let mut acquisition = Acquisition::new(bench_sensor(&bus, &cs), adc, cs);
        let sample = acquisition.sample().unwrap().sample;

        let report = normalize(&sample, &CalibrationBounds::FULL_RANGE);
        let intent = map(&ControlSettings::default(), &report);

        assert_eq!(report.accelerator, 0.0);
        assert_eq!(intent.forward, 0.0);
    }

    #[test]
    fn test_adc_failure_propagates() {
        let bus = SimForceBus::new(2);
        let cs = SchedulerSuspend::new();
        let mut adc = MockPedalAdc::new();
        adc.expect_select_input().returning(|_| Ok(()));
        adc.expect_read()
            .returning(|| Err(crate::hal::HalError::Device("adc timeout".into())));

        let mut acquisition = Acquisition::new(bench_sensor(&bus, &cs), adc, cs);

        assert!(acquisition.sample().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prime_waits_for_first_conversion() {
        let bus = SimForceBus::new(2);
        let cs = SchedulerSuspend::new();
        let pedals = SimPedals::new();
        let mut acquisition = Acquisition::new(bench_sensor(&bus, &cs), pedals.adc(), cs);

        let feeder = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            feeder.latch(&[9, -9]);
        });

        let started = tokio::time::Instant::now();
        acquisition.prime(DEFAULT_PRIME_POLL).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(30));
        let acquired = acquisition.sample().unwrap();
        assert!(!acquired.force_fresh);
        assert_eq!(acquired.sample.left_tiller, 9);
        assert_eq!(acquired.sample.right_tiller, -9);
    }
}
