use std::backtrace::Backtrace;
use std::panic::{self, PanicHookInfo};
use std::process::{self, ExitCode};

use circleci_provider::{init_logging, serve, CircleCiProvider};
use tracing::error;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

fn panic_report(info: &PanicHookInfo<'_>) -> String {
    let mut report = format!("!!! PROVIDER PANIC CAUGHT: {}", panic_message(info.payload()));
    if let Some(location) = info.location() {
        report.push_str(&format!("\nat {}:{}", location.file(), location.line()));
    }
    report
}

fn main() -> ExitCode {
    init_logging();

    // Tokio catches panics in spawned tasks, so a handler panic would
    // otherwise only fail its RPC. Any panic on any thread ends the process.
    panic::set_hook(Box::new(|info| {
        eprintln!("{}", panic_report(info));
        eprintln!("{}", Backtrace::force_capture());
        process::exit(1);
    }));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start the tokio runtime");
            return ExitCode::FAILURE;
        },
    };

    match runtime.block_on(serve(CircleCiProvider::new())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "provider exited with an error");
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&42_u32), "unknown panic payload");
    }

    #[test]
    fn test_panic_in_spawned_task_reaches_hook() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            sink.lock().unwrap().push(panic_report(info));
        }));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let joined = runtime.block_on(async {
            tokio::spawn(async { panic!("handler exploded") }).await
        });
        panic::set_hook(previous);

        assert!(joined.unwrap_err().is_panic());
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("!!! PROVIDER PANIC CAUGHT: handler exploded"));
        assert!(reports[0].contains("src/main.rs:"));
    }
}
