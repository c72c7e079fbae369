use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use track_core::{
    Environment, GridAction, GridEnvironment, GridState,
    agent::{PlanningPolicy, Policy, RandomPolicy},
    episode::{Transition, record_step, run_episode},
    map::{Tile, load_environment_from_string},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    /// Uniformly random among the available actions
    Random,
    /// Shortest path to the goal, collecting the key when needed
    Planner,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Map file to load
    #[arg(short, long, value_name = "MAP_FILE", default_value = "maps/map01.txt")]
    map: PathBuf,

    /// Policy driving the agent
    #[arg(short, long, value_enum, default_value_t = PolicyKind::Planner)]
    policy: PolicyKind,

    /// Seed for the random policy
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stop the episode after this many steps
    #[arg(long, default_value_t = 200)]
    max_steps: usize,

    /// Milliseconds between simulation steps
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// Run the episode without the terminal UI and log the result
    #[arg(long)]
    headless: bool,

    /// Write logs to this file
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn make_policy(kind: PolicyKind, seed: u64) -> Box<dyn Policy<GridEnvironment>> {
    match kind {
        PolicyKind::Random => Box::new(RandomPolicy::new(seed)),
        PolicyKind::Planner => Box::new(PlanningPolicy::<GridEnvironment>::new()),
    }
}

struct App {
    /// The scenario being played.
    environment: GridEnvironment,
    /// Current state of the episode.
    state: GridState,
    policy: Box<dyn Policy<GridEnvironment>>,
    policy_kind: PolicyKind,
    seed: u64,
    max_steps: usize,
    steps: usize,
    last_transition: Option<Transition<GridEnvironment>>,
    /// Flag to control the main loop.
    should_quit: bool,
    /// Set once the episode can make no further progress.
    finished: Option<&'static str>,
}

impl App {
    fn new(environment: GridEnvironment, args: &Args) -> Self {
        let state = environment.initial_state();
        App {
            environment,
            state,
            policy: make_policy(args.policy, args.seed),
            policy_kind: args.policy,
            seed: args.seed,
            max_steps: args.max_steps,
            steps: 0,
            last_transition: None,
            should_quit: false,
            finished: None,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        if self.finished.is_some() {
            return;
        }
        if self.environment.is_terminal(&self.state) {
            tracing::info!(steps = self.steps, "goal reached");
            self.finished = Some("Goal reached!");
            return;
        }
        if self.steps >= self.max_steps {
            tracing::info!(steps = self.steps, "step limit reached");
            self.finished = Some("Step limit reached.");
            return;
        }
        let Some(action) = self.policy.select_action(&self.environment, &self.state) else {
            tracing::info!(steps = self.steps, "policy has no action");
            self.finished = Some("No action available.");
            return;
        };

        let transition = record_step(&self.environment, &self.state, action);
        tracing::debug!(
            step = self.steps,
            action = ?transition.action,
            accepted = transition.accepted,
            "step"
        );
        self.state = transition.next_state.clone();
        self.last_transition = Some(transition);
        self.steps += 1;
    }

    /// Starts the episode over with a fresh policy.
    fn reset(&mut self) {
        tracing::info!("episode reset");
        self.state = self.environment.initial_state();
        self.policy = make_policy(self.policy_kind, self.seed);
        self.steps = 0;
        self.last_transition = None;
        self.finished = None;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.headless)?;

    let map_string = std::fs::read_to_string(&args.map)
        .with_context(|| format!("Failed to read map file: {}", args.map.display()))?;
    let environment = load_environment_from_string(&map_string)
        .with_context(|| format!("Failed to load map: {}", args.map.display()))?;

    if args.headless {
        run_headless(&environment, &args);
        return Ok(());
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let mut app = App::new(environment, &args);
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));

    // Restore the terminal even if the loop failed
    restore_terminal(&mut terminal)?;

    result
}

/// Sends logs to `log_file` when given, otherwise to stderr in headless mode.
///
/// The interactive UI owns the terminal, so without a log file it logs nothing.
fn init_logging(log_file: Option<&Path>, headless: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG);
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None if headless => builder.with_writer(io::stderr).init(),
        None => {}
    }
    Ok(())
}

fn run_headless(environment: &GridEnvironment, args: &Args) {
    let mut policy = make_policy(args.policy, args.seed);
    let trajectory = run_episode(environment, &mut *policy, args.max_steps);

    for (step, transition) in trajectory.transitions.iter().enumerate() {
        tracing::info!(
            step,
            action = ?transition.action,
            from = ?transition.state.agent_pos,
            to = ?transition.next_state.agent_pos,
            accepted = transition.accepted,
            "transition"
        );
    }
    tracing::info!(
        outcome = ?trajectory.outcome,
        steps = trajectory.len(),
        rejected = trajectory.rejected(),
        "episode finished\n{}",
        trajectory.final_state
    );
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char('r') => app.reset(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Area for the map
            Constraint::Percentage(20), // Area for status
            Constraint::Percentage(10), // Area for help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], &app.state);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new("Press 'r' to restart, 'q' or 'Esc' to quit.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn describe_action(action: &GridAction) -> String {
    match *action {
        GridAction::Move { dx: -1, dy: 0 } => "left".to_string(),
        GridAction::Move { dx: 1, dy: 0 } => "right".to_string(),
        GridAction::Move { dx: 0, dy: -1 } => "up".to_string(),
        GridAction::Move { dx: 0, dy: 1 } => "down".to_string(),
        GridAction::Move { dx, dy } => format!("move ({dx}, {dy})"),
        GridAction::PickupKey => "pick up key".to_string(),
    }
}

/// Renders the agent's status onto the frame.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let state = &app.state;
    let key_span = if state.has_key() {
        Span::styled("held", Style::default().fg(Color::Yellow))
    } else {
        Span::raw("on the ground")
    };
    let mut lines = vec![
        Line::from(format!(
            "Pos: ({}, {})  Steps: {}/{}  Policy: {:?}",
            state.agent_pos.x, state.agent_pos.y, app.steps, app.max_steps, app.policy_kind
        )),
        Line::from(vec![Span::raw("Key: "), key_span]),
    ];
    if let Some(transition) = &app.last_transition {
        let verdict = if transition.accepted {
            Span::styled("accepted", Style::default().fg(Color::Green))
        } else {
            Span::styled("rejected", Style::default().fg(Color::Red))
        };
        lines.push(Line::from(vec![
            Span::raw(format!("Last action: {} ", describe_action(&transition.action))),
            verdict,
        ]));
    }
    if let Some(message) = app.finished {
        lines.push(Line::from(Span::styled(
            message,
            Style::default().fg(Color::Green).bold(),
        )));
    }

    let status = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}

/// Renders the grid onto the frame.
fn render_map(frame: &mut Frame, area: Rect, state: &GridState) {
    let tiles = state.tiles();
    let lines: Vec<Line> = tiles
        .rows()
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .map(|tile| {
                    let style = match tile {
                        Tile::Agent => Style::default().fg(Color::Red).bold(),
                        Tile::Key => Style::default().fg(Color::Yellow),
                        Tile::Goal => Style::default().fg(Color::Green),
                        Tile::Obstacle if state.has_key() => Style::default().fg(Color::Gray),
                        Tile::Obstacle => Style::default().fg(Color::DarkGray),
                        Tile::Floor => Style::default(),
                    };
                    Span::styled(tile.symbol().to_string(), style)
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Grid World").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}
