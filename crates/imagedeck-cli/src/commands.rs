//! Subcommand handlers.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use imagedeck_core::api::poll_images;
use imagedeck_core::auth::{
    CredentialStore, LifecycleState, SessionEvent, SessionLifecycle, SessionStore, UserProfile,
};
use imagedeck_core::models::RestoreRequest;
use imagedeck_core::workflow::{plans, Orchestrator, StepSpec, StepStatus, Workflow};
use imagedeck_core::{ApiClient, Config};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{ApplyConfigArgs, ImagesArgs, LoginArgs, LogoutArgs, RestoreArgs, SaveArgs, SignupArgs};

/// Shared state for one invocation
pub struct App {
    pub config: Config,
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
}

impl App {
    fn token(&self) -> Result<String> {
        match self.session.token() {
            Some(token) => Ok(token),
            None => bail!("No session found. Run `imagedeck login` first."),
        }
    }
}

// ============================================================================
// Account
// ============================================================================

pub async fn login(app: &mut App, args: LoginArgs) -> Result<()> {
    let login = match args.login.or_else(|| app.config.last_login.clone()) {
        Some(login) => login,
        None => prompt_line("Login: ")?,
    };
    if login.is_empty() {
        bail!("Login name required");
    }

    let server = app.api.base_url().to_string();
    let remembered = if args.prompt {
        None
    } else {
        CredentialStore::get_password(&server, &login).ok()
    };
    let password = match remembered {
        Some(password) => {
            println!("Using remembered password for {}", login);
            password
        }
        None => rpassword::prompt_password("Password: ")?,
    };

    println!("\nAuthenticating...");
    let credential = app
        .api
        .login(&login, &password)
        .await
        .map_err(|e| {
            if e.is_unauthorized() {
                anyhow::anyhow!("Invalid login or password")
            } else {
                anyhow::Error::from(e).context("Login failed")
            }
        })?;

    let expires_at = credential.expires_at;
    app.session
        .set_with_user(credential, UserProfile { login: login.clone() })?;

    if args.remember {
        if let Err(e) = CredentialStore::store(&server, &login, &password) {
            warn!(error = %e, "Failed to remember password");
        }
    }

    app.config.last_login = Some(login.clone());
    if let Err(e) = app.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    info!(%login, "Login successful");
    println!(
        "Logged in as {} (session expires {})",
        login,
        expires_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

/// Logout is best effort on the server side; the local session is always removed.
pub async fn logout(app: &App, args: LogoutArgs) -> Result<()> {
    let user = app.session.user();
    match app.session.token() {
        Some(token) => {
            if let Err(e) = app.api.end_session(&token).await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
            app.session.clear()?;
            println!("Logged out.");
        }
        None => println!("Not logged in."),
    }

    if args.forget {
        let login = user
            .map(|u| u.login)
            .or_else(|| app.config.last_login.clone());
        if let Some(login) = login {
            match CredentialStore::delete(app.api.base_url(), &login) {
                Ok(()) => println!("Forgot remembered password for {}.", login),
                Err(e) => warn!(error = %e, "No remembered password removed"),
            }
        }
    }
    Ok(())
}

pub async fn signup(app: &App, args: SignupArgs) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    if password.is_empty() {
        bail!("Password required");
    }

    app.api
        .create_user(&args.login, &password)
        .await
        .context("Account creation failed")?;
    println!("Account {} created. Run `imagedeck login {}`.", args.login, args.login);
    Ok(())
}

pub fn status(app: &App) -> Result<()> {
    println!("Server:  {}", app.api.base_url());
    match app.session.get() {
        Some(credential) => {
            let login = app
                .session
                .user()
                .map(|u| u.login)
                .unwrap_or_else(|| "(unknown)".to_string());
            println!("Login:   {}", login);
            if credential.is_expired() {
                println!("Session: expired");
            } else {
                println!(
                    "Session: active, expires in {} min",
                    credential.minutes_until_expiry()
                );
            }
        }
        None => println!("Session: none"),
    }
    Ok(())
}

// ============================================================================
// Images
// ============================================================================

pub async fn images(app: &App, args: ImagesArgs) -> Result<()> {
    let token = app.token()?;
    if !args.watch {
        let images = app.api.list_images(&token).await.context("Failed to list images")?;
        print_images(images.iter());
        return Ok(());
    }

    let (lifecycle, mut events) = SessionLifecycle::start(app.api.clone(), app.session.clone());
    let (tx, mut rx) = mpsc::channel(1);
    let poller = tokio::spawn(poll_images(
        app.api.clone(),
        app.session.clone(),
        app.config.image_poll_interval(),
        tx,
    ));

    let result = loop {
        tokio::select! {
            biased;

            Some(event) = events.recv() => {
                if let SessionEvent::Lost { reason } = event {
                    break Err(anyhow::anyhow!("Session lost: {}", reason));
                }
            }
            list = rx.recv() => match list {
                Some(images) => {
                    println!("--- {} ---", chrono::Local::now().format("%H:%M:%S"));
                    print_images(images.iter());
                }
                // The lifecycle goes Invalid before it clears the store
                None if lifecycle.state() == LifecycleState::Invalid => {
                    break Err(anyhow::anyhow!("Session lost: refresh failed"));
                }
                None => break Ok(()),
            },
        }
    };
    poller.abort();
    result
}

fn print_images<'a>(names: impl Iterator<Item = &'a str>) {
    let mut count = 0;
    for name in names {
        println!("  {}", name);
        count += 1;
    }
    if count == 0 {
        println!("  (no images)");
    }
}

// ============================================================================
// Workflows
// ============================================================================

pub async fn restart(app: &App) -> Result<()> {
    run_workflow(app, plans::restart(&app.api)).await
}

pub async fn create_image(app: &App) -> Result<()> {
    run_workflow(app, plans::create_image(&app.api)).await
}

pub async fn restore_image(app: &App, args: RestoreArgs) -> Result<()> {
    let request = plans::check_restore_request(RestoreRequest {
        image: args.image,
        clients_to_wait: args.clients,
        max_time_to_wait: args.max_wait,
    })?;
    let token = app.token()?;
    let available = app
        .api
        .list_images(&token)
        .await
        .context("Failed to list images")?;
    let steps = plans::restore_image(&app.api, request, &available)?;
    run_workflow(app, steps).await
}

pub async fn save_image(app: &App, args: SaveArgs) -> Result<()> {
    let steps = plans::save_image(&app.api, &args.name)?;
    run_workflow(app, steps).await
}

pub async fn apply_config(app: &App, args: ApplyConfigArgs) -> Result<()> {
    let steps = plans::apply_config(&app.api, args.changes())?;
    run_workflow(app, steps).await
}

/// Run `steps` with background session refresh, printing each transition.
async fn run_workflow(app: &App, steps: Vec<StepSpec>) -> Result<()> {
    let (lifecycle, mut events) = SessionLifecycle::start(app.api.clone(), app.session.clone());
    let mut orchestrator = Orchestrator::new(app.session.clone());
    let mut printer = StepPrinter::default();

    let result = {
        let run = orchestrator.run_with_progress(steps, |workflow| printer.update(workflow));
        tokio::pin!(run);
        loop {
            tokio::select! {
                result = &mut run => break result,
                Some(event) = events.recv() => match event {
                    SessionEvent::Refreshed { expires_at } => {
                        info!(%expires_at, "Session refreshed during workflow");
                    }
                    SessionEvent::Lost { reason } => {
                        eprintln!("Session lost: {}", reason);
                    }
                },
            }
        }
    };
    lifecycle.shutdown();

    let progress = orchestrator.workflow().progress();
    match result {
        Ok(()) => {
            println!("Completed ({:.0}%)", progress * 100.0);
            Ok(())
        }
        Err(e) => {
            println!("Stopped at {:.0}%", progress * 100.0);
            Err(e.into())
        }
    }
}

/// Prints a line whenever a step changes status
#[derive(Default)]
struct StepPrinter {
    seen: Vec<StepStatus>,
}

impl StepPrinter {
    fn update(&mut self, workflow: &Workflow) {
        let steps = workflow.steps();
        if self.seen.len() != steps.len() {
            self.seen = vec![StepStatus::Pending; steps.len()];
        }
        for (i, step) in steps.iter().enumerate() {
            if self.seen[i] != step.status {
                self.seen[i] = step.status;
                println!("{}", format_step(i, steps.len(), &step.label, step.status));
            }
        }
    }
}

fn format_step(index: usize, total: usize, label: &str, status: StepStatus) -> String {
    let marker = match status {
        StepStatus::Pending => " ",
        StepStatus::Active => ">",
        StepStatus::Done => "+",
        StepStatus::Error => "!",
    };
    format!("[{}/{}] {} {} ... {}", index + 1, total, marker, label, status.label())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
