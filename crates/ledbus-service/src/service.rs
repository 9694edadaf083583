//! Service lifecycle: bring the controller onto the bus, serve until
//! interrupted, tear down.

use std::sync::Arc;

use tracing::info;

use ledbus_config::AppConfig;
use ledbus_core::bus::{BusAttachment, BusOptions, NameFlags, SessionOpts, TransportMask};
use ledbus_core::led::led_interface;
use ledbus_core::{BusError, Interrupt};
use ledbus_gpio::{Gpio, GpioError};

use crate::controller::LedController;
use crate::listener::LedServiceListener;

/// Exit status when the GPIO collaborator cannot be initialised.
pub const EXIT_GPIO_UNAVAILABLE: u8 = 64;

/// Errors that end the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl ServiceError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ServiceError::Gpio(_) => EXIT_GPIO_UNAVAILABLE,
            ServiceError::Bus(e) => e.code(),
        }
    }
}

/// Human-readable status for the shutdown line.
pub fn status_text(result: &Result<(), ServiceError>) -> String {
    match result {
        Ok(()) => "OK".to_string(),
        Err(e) => e.to_string(),
    }
}

/// Exit status for a finished run, `0` on clean shutdown.
pub fn exit_code(result: &Result<(), ServiceError>) -> u8 {
    match result {
        Ok(()) => ledbus_core::bus::STATUS_OK,
        Err(e) => e.exit_code(),
    }
}

/// Run the LED service until `interrupt` fires.
///
/// Startup is fail-fast: the first failing step ends the run with its
/// error. Bus resources are released on every path.
pub async fn run_service(
    config: &AppConfig,
    gpio: Arc<dyn Gpio>,
    interrupt: &Interrupt,
) -> Result<(), ServiceError> {
    gpio.setup()?;
    info!(backend = gpio.name(), "GPIO ready");

    let bus = BusAttachment::new(&config.bus.app_name, BusOptions::from_config(&config.bus)?);
    let result = serve(&bus, config, gpio, interrupt).await;
    bus.stop().await;
    result
}

async fn serve(
    bus: &BusAttachment,
    config: &AppConfig,
    gpio: Arc<dyn Gpio>,
    interrupt: &Interrupt,
) -> Result<(), ServiceError> {
    let name = config.bus.service_name.as_str();
    let port = config.bus.session_port;

    let intf = led_interface(name)?;
    bus.add_interface(intf.clone())?;
    info!(interface = name, "Created message interface");

    let listener = Arc::new(LedServiceListener::new(name, port));
    bus.register_bus_listener(listener.clone());
    bus.start()?;

    let mut controller = LedController::new(gpio, config.gpio.settle());
    controller.register_pins(&config.gpio.pins).await?;
    let object = Arc::new(controller).into_bus_object(&intf, &config.bus.object_path)?;
    bus.register_bus_object(object)?;
    info!(path = %config.bus.object_path, "Object registered");

    bus.connect()?;
    bus.request_name(
        name,
        NameFlags {
            replace_existing: true,
            do_not_queue: true,
        },
    )?;
    bus.bind_session_port(port, SessionOpts::default(), listener)?;
    bus.advertise_name(name, TransportMask::ANY)?;
    info!(name, port, "LED service ready");

    interrupt.wait(config.bus.poll_interval()).await;
    info!("interrupt received, stopping");
    bus.cancel_advertise_name(name);
    bus.unbind_session_port(port);
    bus.release_name(name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledbus_gpio::{Level, SimulatedGpio};
    use ledbus_test_utils::TestBus;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_gpio_failure_is_fatal() {
        let bus = TestBus::new();
        let result = run_service(
            &bus.config(),
            Arc::new(SimulatedGpio::unavailable()),
            &Interrupt::new(),
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Gpio(_))));
        assert_eq!(exit_code(&result), EXIT_GPIO_UNAVAILABLE);
        assert!(!bus.peers_dir().exists());
    }

    #[test_log::test(tokio::test)]
    async fn test_interrupt_shuts_down_cleanly() {
        let bus = TestBus::new();
        let gpio = SimulatedGpio::new();
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let result = run_service(&bus.config(), Arc::new(gpio.clone()), &interrupt).await;
        assert!(result.is_ok());
        assert_eq!(status_text(&result), "OK");
        assert_eq!(exit_code(&result), 0);
        for pin in [4, 5, 6] {
            assert_eq!(gpio.level(pin), Some(Level::High));
        }
        // endpoint, name and advert are gone after shutdown
        assert_eq!(bus.entries("peers"), Vec::<String>::new());
        assert_eq!(bus.entries("names"), Vec::<String>::new());
        assert_eq!(bus.entries("adverts"), Vec::<String>::new());
    }

    #[test_log::test(tokio::test)]
    async fn test_configured_pins_are_registered() {
        let bus = TestBus::new();
        let gpio = SimulatedGpio::new();
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let config = bus.builder().pins(&[7, 8]).settle_ms(1).build();
        let result = run_service(&config, Arc::new(gpio.clone()), &interrupt).await;
        assert!(result.is_ok());
        assert_eq!(gpio.writes(), vec![(7, Level::High), (8, Level::High)]);
        assert!(gpio.is_output(7));
        assert_eq!(gpio.level(4), None);
    }

    #[test]
    fn test_bus_error_exit_codes() {
        let err = ServiceError::Bus(BusError::NameExists("iot.example.led".into()));
        assert_eq!(err.exit_code(), 12);
        assert_eq!(
            status_text(&Err(err)),
            "name iot.example.led is already owned"
        );
    }
}
