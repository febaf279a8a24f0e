use std::{sync::Arc, time::SystemTime};

use serp::*;

// Application traits and their implementations

trait Sink: Send + Sync {
    fn write(&self, line: &str);
}

trait Clock: Send + Sync {
    fn stamp(&self) -> String;
}

struct Stdout;

impl Sink for Stdout {
    fn write(&self, line: &str) {
        println!("{}", line);
    }
}

struct SystemClock;

impl SystemClock {
    fn new(sink: Arc<dyn Sink>) -> Self {
        sink.write("clock started");
        SystemClock
    }
}

impl Clock for SystemClock {
    fn stamp(&self) -> String {
        let elapsed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        format!("[{}]", elapsed.as_secs())
    }
}

// Registrations shared by all scopes of the application
fn logging(injector: &Injector) -> InjectionResult<()> {
    injector.service(|| Stdout);
    bind!(injector, Arc<Stdout> => Arc<dyn Sink>)?;
    injector.service(SystemClock::new);
    bind!(injector, Arc<SystemClock> => Arc<dyn Clock>)
}

fn main() -> Result<(), InjectionError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = Registry::new();
    registry.install(&logging)?;

    // a request scope sees the root registrations and adds its own
    let request = registry.get_injector("http.request");
    request.instance(String::from("GET /"));

    let handle = request.consumer(|route: String, sink: Arc<dyn Sink>, clock: Arc<dyn Clock>| {
        sink.write(&format!("{} handling {}", clock.stamp(), route));
    });
    handle.call()?;
    handle.call_with((Some(String::from("POST /items")), None, None))?;

    Ok(())
}
