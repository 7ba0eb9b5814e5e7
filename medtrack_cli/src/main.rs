use chrono::{Datelike, Days, Local, NaiveDate, NaiveTime, Weekday};
use clap::{Parser, Subcommand};
use medtrack_core::notify::{schedule_all, LogScheduler};
use medtrack_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "medtrack")]
#[command(about = "Personal medication schedule tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a local profile
    Register {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        gender: Option<String>,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        dob: Option<NaiveDate>,
    },

    /// Log in as a registered profile
    Login {
        email: String,
    },

    /// Log out
    Logout,

    /// Show the logged-in profile
    Whoami,

    /// Add a medicine
    Add {
        #[arg(long)]
        name: String,

        /// Picture catalog id (see `pictures`)
        #[arg(long)]
        picture: Option<String>,

        #[arg(long, default_value = "0")]
        dosage: String,

        /// Strength in mg
        #[arg(long, default_value = "0")]
        strength: String,

        /// e.g. "before meal"
        #[arg(long, default_value = "")]
        condition: String,

        /// First day of the course (YYYY-MM-DD, default today)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// Course length
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        duration: i64,

        /// days, weeks, months or years
        #[arg(long, default_value = "days")]
        unit: String,

        /// everyday, weekdays, weekends or custom
        #[arg(long)]
        frequency: Option<String>,

        /// Comma-separated weekdays, e.g. mon,wed,fri
        #[arg(long, value_delimiter = ',', value_parser = parse_weekday)]
        days: Vec<Weekday>,

        /// Reminder time (HH:MM), repeatable
        #[arg(long = "reminder", value_parser = parse_time)]
        reminders: Vec<NaiveTime>,
    },

    /// List medicines
    List {
        /// Case-insensitive name filter
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one medicine (full id or unique prefix)
    Show {
        id: String,
    },

    /// Delete a medicine (full id or unique prefix)
    Delete {
        id: String,
    },

    /// Month view with dose indicators
    Calendar {
        /// Month to show (YYYY-MM, default current month)
        #[arg(long, value_parser = parse_month)]
        month: Option<(i32, u32)>,
    },

    /// Doses due on one day
    Agenda {
        /// Day to show (YYYY-MM-DD, default today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Plan reminder notifications
    Notify {
        /// First day to plan (YYYY-MM-DD, default today)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Number of days to plan
        #[arg(long)]
        days: Option<u32>,
    },

    /// Export doses to CSV
    Export {
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,

        /// Output file (default <data-dir>/agenda.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Rewrite the medicine store without deleted entries
    Compact,

    /// List the medicine picture catalog
    Pictures,
}

struct Paths {
    session: PathBuf,
    store: PathBuf,
    export: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        Self {
            session: data_dir.join("session.json"),
            store: data_dir.join("medicines.jsonl"),
            export: data_dir.join("agenda.csv"),
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    medtrack_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;
    let paths = Paths::new(&data_dir);
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Commands::Register {
            username,
            email,
            gender,
            dob,
        } => cmd_register(
            &paths,
            Registration {
                username,
                email,
                gender,
                date_of_birth: dob,
            },
        ),
        Commands::Login { email } => cmd_login(&paths, &email),
        Commands::Logout => cmd_logout(&paths),
        Commands::Whoami => cmd_whoami(&paths),
        Commands::Add {
            name,
            picture,
            dosage,
            strength,
            condition,
            start,
            duration,
            unit,
            frequency,
            days,
            reminders,
        } => {
            let duration = DurationSpec::from_signed(duration, unit.parse()?)?;
            let frequency = frequency.map(|f| f.parse::<FrequencyTag>()).transpose()?;
            let draft = MedicineDraft::new(
                start.unwrap_or_else(today),
                config.schedule.default_reminder,
            );
            cmd_add(
                &paths,
                draft,
                AddArgs {
                    name,
                    picture,
                    dosage,
                    strength,
                    condition,
                    duration,
                    frequency,
                    days,
                    reminders,
                },
            )
        }
        Commands::List { search } => cmd_list(&paths, search.as_deref()),
        Commands::Show { id } => cmd_show(&paths, &id),
        Commands::Delete { id } => cmd_delete(&paths, &id),
        Commands::Calendar { month } => {
            let now = today();
            let (year, month) = month.unwrap_or((now.year(), now.month()));
            cmd_calendar(&paths, year, month)
        }
        Commands::Agenda { date } => cmd_agenda(&paths, date.unwrap_or_else(today)),
        Commands::Notify { from, days } => cmd_notify(
            &paths,
            from.unwrap_or_else(today),
            days.unwrap_or(config.notifications.lookahead_days),
            &config,
        ),
        Commands::Export { from, to, out } => {
            let from = from.unwrap_or_else(today);
            let to = match to {
                Some(to) => to,
                None => window_end(from, config.schedule.calendar_lookahead_days)?,
            };
            cmd_export(&paths, from, to, out.as_deref())
        }
        Commands::Compact => cmd_compact(&paths),
        Commands::Pictures => cmd_pictures(),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn context(paths: &Paths) -> Result<ClientContext<JsonlStore>> {
    let session = SessionState::load(&paths.session)?;
    Ok(ClientContext::new(
        JsonlStore::new(&paths.store),
        session.current_user().cloned(),
    ))
}

fn cmd_register(paths: &Paths, registration: Registration) -> Result<()> {
    let profile = SessionState::update(&paths.session, |state| state.register(registration))?;
    println!("✓ Registered {} <{}>", profile.username, profile.email);
    println!("  Log in with: medtrack login {}", profile.email);
    Ok(())
}

fn cmd_login(paths: &Paths, email: &str) -> Result<()> {
    let profile = SessionState::update(&paths.session, |state| state.login(email))?;
    println!("✓ Logged in as {}", profile.username);
    Ok(())
}

fn cmd_logout(paths: &Paths) -> Result<()> {
    let was_logged_in = SessionState::update(&paths.session, |state| Ok(state.logout()))?;
    if was_logged_in {
        println!("✓ Logged out");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn cmd_whoami(paths: &Paths) -> Result<()> {
    let session = SessionState::load(&paths.session)?;
    match session.current_user() {
        Some(profile) => {
            println!("  Username: {}", profile.username);
            println!("  Email:    {}", profile.email);
            if let Some(ref gender) = profile.gender {
                println!("  Gender:   {}", gender);
            }
            if let Some(dob) = profile.date_of_birth {
                println!("  Born:     {}", format_date(dob));
            }
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

struct AddArgs {
    name: String,
    picture: Option<String>,
    dosage: String,
    strength: String,
    condition: String,
    duration: DurationSpec,
    frequency: Option<FrequencyTag>,
    days: Vec<Weekday>,
    reminders: Vec<NaiveTime>,
}

fn cmd_add(paths: &Paths, draft: MedicineDraft, args: AddArgs) -> Result<()> {
    let mut ctx = context(paths)?;
    // Fail before walking the form, as the app does on submit
    ctx.require_user()?;

    // Step 1: name and picture
    let wizard = Wizard::start(draft)
        .edit(|d| d.with_name(args.name).with_picture(args.picture))
        .next()?;

    // Step 2: dosing and course length
    let wizard = wizard
        .edit(|d| {
            d.with_dosage(args.dosage)
                .with_strength(args.strength)
                .with_condition(args.condition)
                .with_duration(args.duration.amount, args.duration.unit)
        })
        .next()?;

    // Step 3: weekdays and reminders
    let wizard = wizard
        .edit(|mut d| {
            if let Some(frequency) = args.frequency {
                d = d.with_frequency(frequency);
            }
            if !args.days.is_empty() {
                d = d.with_selected_days(WeekdayMask::from_weekdays(&args.days));
            }
            if !args.reminders.is_empty() {
                d.reminder_times = args.reminders;
            }
            d
        })
        .next()?;

    let input = wizard
        .into_submitted()
        .ok_or_else(|| Error::Wizard("medicine was not submitted".into()))?;
    let medicine = ctx.add_medicine(input)?;

    println!("✓ Medicine added!");
    println!("  Id:        {}", medicine.id);
    println!("  Frequency: {}", medicine.frequency);
    Ok(())
}

fn cmd_list(paths: &Paths, search: Option<&str>) -> Result<()> {
    let ctx = context(paths)?;
    let medicines = ctx.medicines(search)?;

    if medicines.is_empty() {
        println!("No medicines found.");
        return Ok(());
    }

    for medicine in &medicines {
        let first_alarm = medicine
            .input
            .reminder_times
            .first()
            .map(|t| format_time(*t))
            .unwrap_or_default();
        println!(
            "{}  {:<20} {} - {}  {}",
            short_id(medicine),
            medicine.input.name,
            medicine.input.dosage,
            medicine.frequency,
            first_alarm
        );
    }
    Ok(())
}

fn cmd_show(paths: &Paths, id: &str) -> Result<()> {
    let ctx = context(paths)?;
    let medicine = ctx.resolve(id)?;
    let rule = medicine.rule()?;
    let input = &medicine.input;

    let picture = input
        .picture_id
        .as_deref()
        .and_then(catalog::find_picture)
        .map(|p| p.name)
        .unwrap_or("Not set");
    let reminders: Vec<String> = input.reminder_times.iter().map(|t| format_time(*t)).collect();

    println!("\n  {}", input.name);
    println!();
    println!("  Id:         {}", medicine.id);
    println!("  Picture:    {}", picture);
    println!("  Dosage:     {}", input.dosage);
    println!("  Strength:   {} mg", input.strength);
    let condition = if input.condition.is_empty() {
        "-"
    } else {
        input.condition.as_str()
    };
    println!("  Condition:  {}", condition);
    println!("  Start date: {}", format_date(rule.start_date()));
    println!("  Duration:   {}", rule.duration());
    println!("  Last dose:  {}", format_date(rule.end_date()));
    println!("  Frequency:  {}", rule.frequency());
    println!("  Days:       {}", rule.selected_days());
    println!("  Reminders:  {}", reminders.join(", "));
    println!();
    Ok(())
}

fn cmd_delete(paths: &Paths, id: &str) -> Result<()> {
    let mut ctx = context(paths)?;
    let medicine = ctx.resolve(id)?;
    ctx.delete_medicine(medicine.id)?;
    println!("✓ Deleted {}", medicine.input.name);
    Ok(())
}

fn cmd_calendar(paths: &Paths, year: i32, month: u32) -> Result<()> {
    let ctx = context(paths)?;
    let medicines = ctx.medicines(None)?;
    let index = CalendarIndex::for_month(&medicines, year, month)
        .ok_or_else(|| Error::Other(format!("invalid month {}-{:02}", year, month)))?;

    print!("{}", render_month(&index));
    println!();
    println!("  {} doses on {} days", index.dose_count(), index.marked_dates().count());
    Ok(())
}

fn render_month(index: &CalendarIndex) -> String {
    let (first, last) = index.window();
    let mut out = format!("\n  {}\n", first.format("%B %Y"));
    out.push_str("  Su  Mo  Tu  We  Th  Fr  Sa\n  ");

    let lead = first.weekday().num_days_from_sunday() as usize;
    out.push_str(&"    ".repeat(lead));

    for (offset, date) in first.iter_days().take_while(|d| *d <= last).enumerate() {
        let marker = if index.is_marked(date) { '*' } else { ' ' };
        out.push_str(&format!("{:>2}{} ", date.day(), marker));
        if (lead + offset) % 7 == 6 && date != last {
            out.push_str("\n  ");
        }
    }
    out.push('\n');
    out
}

fn cmd_agenda(paths: &Paths, date: NaiveDate) -> Result<()> {
    let ctx = context(paths)?;
    let medicines = ctx.medicines(None)?;
    let index = CalendarIndex::build(&medicines, date, date);

    println!("\n  Medicines for {}", format_date(date));
    let rows = index.agenda(date);
    if rows.is_empty() {
        println!("  No medicines scheduled for this day.");
        return Ok(());
    }

    for entry in rows {
        let condition = if entry.condition.is_empty() {
            String::new()
        } else {
            format!(" ({})", entry.condition)
        };
        println!(
            "  {}  {} - {} x {} mg{}",
            format_time(entry.time),
            entry.name,
            entry.dosage,
            entry.strength,
            condition
        );
    }
    Ok(())
}

fn cmd_notify(paths: &Paths, from: NaiveDate, days: u32, config: &Config) -> Result<()> {
    let ctx = context(paths)?;
    let medicines = ctx.medicines(None)?;
    let to = window_end(from, days)?;

    let plan = plan_notifications(&medicines, from, to);
    let mut scheduler = LogScheduler::new(config.notifications.clone());
    let count = schedule_all(&mut scheduler, &plan)?;

    for request in scheduler.scheduled() {
        println!(
            "  {} {}  {}",
            request.occurrence_date,
            format_time(request.reminder_time),
            request.message()
        );
    }
    println!("✓ Scheduled {} reminders ({} to {})", count, from, to);
    Ok(())
}

fn cmd_export(paths: &Paths, from: NaiveDate, to: NaiveDate, out: Option<&Path>) -> Result<()> {
    let ctx = context(paths)?;
    let medicines = ctx.medicines(None)?;
    let out = out.unwrap_or(&paths.export);

    if from > to {
        return Err(Error::Other(format!("--from {} is after --to {}", from, to)));
    }
    let count = medtrack_core::export::export_agenda_csv(&medicines, from, to, out)?;
    println!("✓ Exported {} doses", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn cmd_compact(paths: &Paths) -> Result<()> {
    let kept = JsonlStore::new(&paths.store).compact()?;
    println!("✓ Compacted store ({} medicines kept)", kept);
    Ok(())
}

fn cmd_pictures() -> Result<()> {
    for picture in catalog::pictures() {
        println!("  {:>2}  {}", picture.id, picture.name);
    }
    Ok(())
}

/// Last day of a `days`-long window starting at `from`
fn window_end(from: NaiveDate, days: u32) -> Result<NaiveDate> {
    from.checked_add_days(Days::new(u64::from(days.max(1)) - 1))
        .ok_or_else(|| {
            Error::Other(format!(
                "{} days from {} is past the last supported date",
                days, from
            ))
        })
}

fn short_id(medicine: &Medicine) -> String {
    medicine.id.to_string()[..8].to_string()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", s, e))
}

fn parse_month(s: &str) -> std::result::Result<(i32, u32), String> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM, got '{}': {}", s, e))?;
    Ok((date.year(), date.month()))
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| format!("expected HH:MM, got '{}': {}", s, e))
}

fn parse_weekday(s: &str) -> std::result::Result<Weekday, String> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("unknown weekday '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_end() {
        let from = NaiveDate::from_ymd_opt(2023, 5, 20).unwrap();
        assert_eq!(window_end(from, 7).unwrap(), NaiveDate::from_ymd_opt(2023, 5, 26).unwrap());
        assert_eq!(window_end(from, 1).unwrap(), from);
        assert_eq!(window_end(from, 0).unwrap(), from);
    }

    #[test]
    fn test_window_end_past_max_date_is_an_error() {
        assert!(matches!(window_end(NaiveDate::MAX, 7), Err(Error::Other(_))));
        assert_eq!(window_end(NaiveDate::MAX, 1).unwrap(), NaiveDate::MAX);
    }
}
