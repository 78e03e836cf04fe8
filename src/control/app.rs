// Motor application: lazy bus connection, the wakeup tick and command handlers
//
// Single-threaded by construction: the runtime owns one `MotorApp` and calls
// into it from one task, so handlers and ticks never overlap.

use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use tracing::{error, info, warn};

use super::state::ControlState;
use crate::config::{ROMI_ADDRESS, i2c_device_path};
use crate::messages::{Command, CommandError, Housekeeping, MotorState};
use crate::motor::{BusError, RomiDriver, check_transaction};
use crate::table::ParamTable;

/// Opens the board; called again on each attempt until one succeeds
pub type Connector<I> = Box<dyn FnMut() -> Result<RomiDriver<I>, BusError> + Send>;

pub struct MotorApp<I: I2c> {
    state: ControlState,
    driver: Option<RomiDriver<I>>,
    connect: Connector<I>,
    table: ParamTable,
}

impl MotorApp<I2cdev> {
    /// App bound to the Romi board on the configured i2c-dev node
    pub fn with_i2c(table: ParamTable) -> Self {
        let path = i2c_device_path();
        Self::new(
            Box::new(move || RomiDriver::connect(&path, ROMI_ADDRESS)),
            table,
        )
    }
}

impl<I: I2c> MotorApp<I> {
    pub fn new(connect: Connector<I>, table: ParamTable) -> Self {
        Self {
            state: ControlState::new(),
            driver: None,
            connect,
            table,
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_some()
    }

    /// Open the bus if it is not open yet. No-op once connected.
    pub fn ensure_connected(&mut self) -> Result<(), BusError> {
        if self.driver.is_some() {
            return Ok(());
        }

        match (self.connect)() {
            Ok(driver) => {
                info!("Romi board connected");
                self.driver = Some(driver);
                Ok(())
            }
            Err(e) => {
                self.state.counters.count_i2c_error();
                error!("Failed to connect to Romi board: {}", e);
                Err(e)
            }
        }
    }

    /// One control period.
    ///
    /// Returns the motor state snapshot to publish, or `None` when the bus has
    /// never been opened (nothing is read or written in that case).
    pub fn wakeup(&mut self) -> Option<MotorState> {
        let driver = self.driver.as_mut()?;
        let state = &mut self.state;
        state.counters.count_command();

        if check_transaction(driver.read_buttons(), &mut state.counters.i2c_errors)
            .is_some_and(|buttons| buttons != 0)
        {
            info!("Romi button pressed");
        }

        if let Some(millivolts) =
            check_transaction(driver.read_battery_millivolts(), &mut state.counters.i2c_errors)
        {
            state.battery_millivolts = millivolts;
        }

        if let Some(encoders) =
            check_transaction(driver.read_encoders(), &mut state.counters.i2c_errors)
        {
            state.apply_encoders(encoders);
        }

        let snapshot = state.motor_state();

        let (left, right) = if state.motors_enabled {
            state.step_control()
        } else {
            state.stop()
        };
        check_transaction(
            driver.write_motors(left, right),
            &mut state.counters.i2c_errors,
        );

        Some(snapshot)
    }

    pub fn housekeeping(&self) -> Housekeeping {
        self.state.housekeeping()
    }

    /// Run one decoded command, connecting first when it touches hardware
    pub fn dispatch(&mut self, cmd: Command) {
        if cmd.needs_hardware() && self.ensure_connected().is_err() {
            warn!("Skipping {:?}: Romi board not connected", cmd);
            return;
        }

        match cmd {
            Command::Noop => self.noop(),
            Command::ResetCounters => self.reset_counters(),
            Command::Process => self.process(),
            Command::Enable => self.set_enable(true),
            Command::Disable => self.set_enable(false),
            Command::SetTargetRelative { left, right } => self.set_target_relative(left, right),
            Command::SetTargetAbsolute { left, right } => self.set_target_absolute(left, right),
            Command::SetTargetDelta { left, right } => self.set_target_delta(left, right),
        }
    }

    /// Count a command that failed decoding
    pub fn reject(&mut self, err: &CommandError) {
        self.state.counters.count_error();
        warn!("Rejected command: {}", err);
    }

    pub fn noop(&mut self) {
        self.state.counters.count_command();
        info!("NOOP command {}", env!("CARGO_PKG_VERSION"));
    }

    pub fn reset_counters(&mut self) {
        self.state.counters.reset();
        info!("RESET command");
    }

    /// Diagnostic pass-through of the parameter table
    pub fn process(&mut self) {
        info!(
            "Table value 1: {} value 2: {}",
            self.table.param1, self.table.param2
        );
        info!("Table CRC: 0x{:04X}", self.table.checksum());
    }

    /// Takes effect on the next tick
    pub fn set_enable(&mut self, on: bool) {
        self.state.motors_enabled = on;
        info!("Motor enable command: {}", on);
    }

    pub fn set_target_relative(&mut self, left: i16, right: i16) {
        let state = &mut self.state;
        state.left_target = state.left_target.wrapping_add(i32::from(left));
        state.right_target = state.right_target.wrapping_add(i32::from(right));
        info!(
            "Motor target set (relative): {} {}",
            state.left_target, state.right_target
        );
    }

    pub fn set_target_absolute(&mut self, left: i16, right: i16) {
        self.state.left_target = i32::from(left);
        self.state.right_target = i32::from(right);
        info!("Motor target set (absolute): {} {}", left, right);
    }

    pub fn set_target_delta(&mut self, left: i16, right: i16) {
        self.state.target_delta_left = left;
        self.state.target_delta_right = right;
        info!("Motor target delta set: {} {}", left, right);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    use super::*;

    const ADDR: u8 = 0x14;

    fn reading(register: u8, data: Vec<u8>) -> [I2cTrans; 2] {
        [
            I2cTrans::write(ADDR, vec![register]),
            I2cTrans::read(ADDR, data),
        ]
    }

    fn failed_reading(register: u8, len: usize) -> [I2cTrans; 2] {
        [
            I2cTrans::write(ADDR, vec![register]),
            I2cTrans::read(ADDR, vec![0; len]).with_error(ErrorKind::Bus),
        ]
    }

    fn encoders(left: i16, right: i16) -> [I2cTrans; 2] {
        let (l, r) = (left.to_le_bytes(), right.to_le_bytes());
        reading(39, vec![l[0], l[1], r[0], r[1]])
    }

    fn motors(left: i16, right: i16) -> I2cTrans {
        let (l, r) = (left.to_le_bytes(), right.to_le_bytes());
        I2cTrans::write(ADDR, vec![6, l[0], l[1], r[0], r[1]])
    }

    /// Idle buttons and battery reads that open every tick
    fn housekeeping_reads() -> Vec<I2cTrans> {
        let mut script = reading(3, vec![0, 0, 0]).to_vec();
        script.extend(reading(10, 7400u16.to_le_bytes().to_vec()));
        script
    }

    /// A whole tick: sensor reads with the given encoder counts, then the power write
    fn tick(counts: (i16, i16), power: (i16, i16)) -> Vec<I2cTrans> {
        let mut script = housekeeping_reads();
        script.extend(encoders(counts.0, counts.1));
        script.push(motors(power.0, power.1));
        script
    }

    /// App whose connector hands out drivers over a mock running `script`
    fn app_with(script: Vec<I2cTrans>) -> (MotorApp<I2cMock>, I2cMock) {
        let i2c = I2cMock::new(&script);
        let bus = i2c.clone();
        let app = MotorApp::new(
            Box::new(move || Ok::<_, BusError>(RomiDriver::new(bus.clone(), ADDR))),
            ParamTable::default(),
        );
        (app, i2c)
    }

    /// Connected app; the script ends with the stop written when the driver is released
    fn connected_app(body: Vec<I2cTrans>) -> (MotorApp<I2cMock>, I2cMock) {
        let mut script = body;
        script.push(motors(0, 0));
        let (mut app, i2c) = app_with(script);
        app.ensure_connected().unwrap();
        (app, i2c)
    }

    fn finish(app: MotorApp<I2cMock>, mut i2c: I2cMock) {
        drop(app);
        i2c.done();
    }

    fn open_failure() -> BusError {
        BusError::DeviceOpenFailed {
            path: "/dev/i2c-1".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound).into(),
        }
    }

    #[test]
    fn test_tick_without_bus_is_noop() {
        let (mut app, i2c) = app_with(vec![]);
        assert!(app.wakeup().is_none());
        assert_eq!(*app.state(), ControlState::new());
        assert!(!app.is_connected());
        finish(app, i2c);
    }

    #[test]
    fn test_ensure_connected_is_idempotent() {
        let mut i2c = I2cMock::new(&[motors(0, 0)]);
        let bus = i2c.clone();
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = opens.clone();
        let mut app = MotorApp::new(
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BusError>(RomiDriver::new(bus.clone(), ADDR))
            }),
            ParamTable::default(),
        );

        app.ensure_connected().unwrap();
        app.ensure_connected().unwrap();
        app.dispatch(Command::Enable);
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        drop(app);
        i2c.done();
    }

    #[test]
    fn test_connect_failure_skips_command_and_retries() {
        let mut i2c = I2cMock::new(&[motors(0, 0)]);
        let bus = i2c.clone();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let mut app = MotorApp::new(
            Box::new(move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(open_failure())
                } else {
                    Ok(RomiDriver::new(bus.clone(), ADDR))
                }
            }),
            ParamTable::default(),
        );

        app.dispatch(Command::SetTargetRelative { left: 10, right: 10 });
        assert_eq!(app.state().left_target, 0);
        assert_eq!(app.state().counters.i2c_errors, 1);
        assert!(!app.is_connected());

        app.dispatch(Command::SetTargetRelative { left: 10, right: 10 });
        assert_eq!(app.state().left_target, 10);
        assert!(app.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        drop(app);
        i2c.done();
    }

    #[test]
    fn test_software_commands_do_not_connect() {
        let mut app: MotorApp<I2cMock> = MotorApp::new(
            Box::new(|| Err::<RomiDriver<I2cMock>, _>(open_failure())),
            ParamTable::default(),
        );

        app.dispatch(Command::Noop);
        app.dispatch(Command::Process);
        assert_eq!(app.state().counters.cmd, 1);
        assert_eq!(app.state().counters.i2c_errors, 0);
    }

    #[test]
    fn test_set_target_accumulates() {
        let (mut app, i2c) = connected_app(vec![]);
        app.dispatch(Command::SetTargetRelative { left: 10, right: -5 });
        app.dispatch(Command::SetTargetRelative { left: 10, right: -5 });
        assert_eq!((app.state().left_target, app.state().right_target), (20, -10));
        finish(app, i2c);
    }

    #[test]
    fn test_set_target_absolute_replaces() {
        let (mut app, i2c) = connected_app(vec![]);
        app.dispatch(Command::SetTargetRelative { left: 10, right: -5 });
        app.dispatch(Command::SetTargetAbsolute { left: 3, right: 4 });
        assert_eq!((app.state().left_target, app.state().right_target), (3, 4));
        finish(app, i2c);
    }

    #[test]
    fn test_set_target_delta_replaces() {
        let (mut app, i2c) = connected_app(vec![]);
        app.dispatch(Command::SetTargetDelta { left: 10, right: 20 });
        app.dispatch(Command::SetTargetDelta { left: 3, right: 4 });
        assert_eq!(
            (app.state().target_delta_left, app.state().target_delta_right),
            (3, 4)
        );
        finish(app, i2c);
    }

    #[test]
    fn test_reset_counters_keeps_odometry() {
        let mut script = tick((50, 60), (0, 0));
        script.extend(housekeeping_reads());
        script.extend(encoders(50, 60));
        script.push(motors(0, 0).with_error(ErrorKind::Bus));
        let (mut app, i2c) = connected_app(script);

        app.dispatch(Command::SetTargetRelative { left: 7, right: 8 });
        app.wakeup();
        app.reject(&CommandError::UnknownCommand("x".to_string()));
        app.wakeup();

        let before = app.state().clone();
        assert_eq!(before.counters.cmd, 2);
        assert_eq!(before.counters.err, 1);
        assert_eq!(before.counters.i2c_errors, 1);

        app.dispatch(Command::ResetCounters);
        let after = app.state();
        assert_eq!(after.counters, Default::default());
        assert_eq!(after.left_odometer, 50);
        assert_eq!(after.right_odometer, 60);
        assert_eq!((after.left_target, after.right_target), (7, 8));
        finish(app, i2c);
    }

    #[test]
    fn test_enable_does_not_write_until_tick() {
        // Only the release stop is scripted; any earlier write would not match
        let (mut app, i2c) = connected_app(vec![]);
        app.dispatch(Command::Enable);
        assert!(app.state().motors_enabled);
        finish(app, i2c);
    }

    #[test]
    fn test_tick_reads_sensors() {
        let mut script = reading(3, vec![1, 0, 0]).to_vec();
        script.extend(reading(10, 7200u16.to_le_bytes().to_vec()));
        script.extend(encoders(12, -4));
        script.push(motors(0, 0));
        let (mut app, i2c) = connected_app(script);

        let snapshot = app.wakeup().unwrap();
        assert_eq!(app.state().battery_millivolts, 7200);
        assert_eq!(snapshot.left_encoder_delta, 12);
        assert_eq!(snapshot.right_encoder_delta, -4);
        assert_eq!(snapshot.left_odometer, 12);
        assert_eq!(snapshot.right_odometer, -4);
        assert_eq!(app.state().counters.cmd, 1);
        finish(app, i2c);
    }

    #[test]
    fn test_disabled_tick_commands_stop() {
        let (mut app, i2c) = connected_app(tick((0, 0), (0, 0)));
        app.wakeup();
        finish(app, i2c);
    }

    #[test]
    fn test_disable_mid_motion_stops_next_tick() {
        let mut script = tick((0, 0), (50, 50));
        script.extend(tick((0, 0), (0, 0)));
        let (mut app, i2c) = connected_app(script);

        app.dispatch(Command::SetTargetDelta { left: 1000, right: 1000 });
        app.dispatch(Command::SetTargetRelative { left: 5000, right: 5000 });
        app.dispatch(Command::Enable);
        app.wakeup();

        app.dispatch(Command::Disable);
        app.wakeup();
        assert_eq!((app.state().left_power, app.state().right_power), (0, 0));
        finish(app, i2c);
    }

    #[test]
    fn test_failed_encoder_read_keeps_odometry() {
        let mut script = tick((100, 200), (0, 0));
        script.extend(housekeeping_reads());
        script.extend(failed_reading(39, 4));
        script.push(motors(0, 0));
        script.extend(tick((150, 260), (0, 0)));
        let (mut app, i2c) = connected_app(script);

        app.wakeup().unwrap();
        let errors_before = app.state().counters.i2c_errors;

        let snapshot = app.wakeup();
        let state = app.state();
        assert!(snapshot.is_some(), "telemetry is produced on a failed read");
        assert_eq!(state.counters.i2c_errors, errors_before + 1);
        assert_eq!((state.left_odometer, state.right_odometer), (100, 200));
        assert_eq!((state.raw_left_encoder, state.raw_right_encoder), (100, 200));

        app.wakeup().unwrap();
        assert_eq!((app.state().left_odometer, app.state().right_odometer), (150, 260));
        finish(app, i2c);
    }

    #[test]
    fn test_io_failures_do_not_abort_tick() {
        let mut script = failed_reading(3, 3).to_vec();
        script.extend(failed_reading(10, 2));
        script.extend(failed_reading(39, 4));
        // motor write still attempted after three failed reads
        script.push(motors(0, 0));
        let (mut app, i2c) = connected_app(script);

        app.dispatch(Command::Enable);
        assert!(app.wakeup().is_some());
        assert_eq!(app.state().counters.i2c_errors, 3);
        finish(app, i2c);
    }

    #[test]
    fn test_step_target_scenario() {
        // target (100,100), delta (10,10), wheels not moving
        let power = |step: i32| (0.05f32 * step as f32) as i16;
        let mut script = Vec::new();
        for tick_no in 1..=10 {
            let p = power(10 * tick_no);
            script.extend(tick((0, 0), (p, p)));
        }
        script.extend(tick((0, 0), (5, 5)));
        let (mut app, i2c) = connected_app(script);

        app.dispatch(Command::SetTargetDelta { left: 10, right: 10 });
        app.dispatch(Command::SetTargetRelative { left: 100, right: 100 });
        app.dispatch(Command::Enable);

        for tick_no in 1..=10 {
            app.wakeup().unwrap();
            let state = app.state();
            let expected = 10 * tick_no;
            assert_eq!(state.left_step_target, expected);
            assert_eq!(state.right_step_target, expected);
            let p = power(expected);
            assert_eq!((state.left_power, state.right_power), (p, p));
        }

        app.wakeup().unwrap();
        assert_eq!(app.state().left_step_target, 100);
        assert_eq!(app.state().left_power, 5);
        finish(app, i2c);
    }

    #[test]
    fn test_power_saturates_on_large_error() {
        let (mut app, i2c) = connected_app(tick((0, 0), (200, -200)));
        app.dispatch(Command::SetTargetDelta { left: 10000, right: 10000 });
        app.dispatch(Command::SetTargetAbsolute { left: 5000, right: -5000 });
        app.dispatch(Command::Enable);
        app.wakeup();

        assert_eq!((app.state().left_power, app.state().right_power), (200, -200));
        finish(app, i2c);
    }

    #[test]
    fn test_snapshot_reports_previous_power() {
        let mut script = tick((0, 0), (50, 50));
        script.extend(tick((0, 0), (50, 50)));
        let (mut app, i2c) = connected_app(script);
        app.dispatch(Command::SetTargetDelta { left: 1000, right: 1000 });
        app.dispatch(Command::SetTargetAbsolute { left: 1000, right: 1000 });
        app.dispatch(Command::Enable);

        let first = app.wakeup().unwrap();
        assert_eq!(first.left_power, 0);
        let second = app.wakeup().unwrap();
        assert_eq!(second.left_power, 50);
        assert!(second.motors_enabled);
        finish(app, i2c);
    }

    #[test]
    fn test_reject_counts_error() {
        let (mut app, i2c) = app_with(vec![]);
        app.reject(&CommandError::Malformed("bad".to_string()));
        assert_eq!(app.housekeeping().err_counter, 1);
        finish(app, i2c);
    }
}
