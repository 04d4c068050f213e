use console::Term;

/// Resolve once Ctrl+C (or SIGTERM on Unix) is received, letting the server
/// drain in-flight requests. A second Ctrl+C exits immediately.
pub(crate) async fn shutdown_signal() {
    tokio::select! {
        () = ctrl_c() => {}
        () = terminate() => {}
    }

    let is_tty = Term::stdout().is_term();
    if is_tty {
        eprintln!("\n\nShutdown requested, finishing in-flight requests...");
        eprintln!("Press Ctrl+C again to force quit.");
    } else {
        tracing::warn!("shutdown requested, finishing in-flight requests");
    }

    // Wait for second Ctrl+C for force quit
    tokio::spawn(async move {
        ctrl_c().await;
        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
