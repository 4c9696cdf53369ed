mod window;

use plume::{init_logging, DemoError, LoggingConfig};
use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> Result<(), DemoError> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = window::App::new();
    event_loop.run_app(&mut app)?;
    app.finish()
}
