use anyhow::{Context, Result, bail};
use confluence_moin_config::Config;
use confluence_moin_engine::moin::DEFAULT_PAGE_PREFIX;
use confluence_moin_engine::users::{self, add_default_user, convert_users};
use confluence_moin_engine::{CrowdBackup, Export, MoinUsers, PageWriter, Timestamp, translate_to};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::{env, fs, process};

const DEFAULT_USER: &str = "unknown";

enum Command {
    Translate { file: Option<PathBuf> },
    Pages { config: Option<PathBuf> },
    Users { backup: PathBuf, dir: PathBuf, default_user: String },
    Group { backup: PathBuf, name: String },
    PruneUsers { dir: PathBuf, valid: PathBuf, move_to: PathBuf },
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            ["translate"] => Command::Translate { file: None },
            ["translate", file] => Command::Translate {
                file: Some(PathBuf::from(file)),
            },
            ["pages"] => Command::Pages { config: None },
            ["pages", config] => Command::Pages {
                config: Some(PathBuf::from(config)),
            },
            ["users", backup, dir] | ["users", backup, dir, _] => Command::Users {
                backup: PathBuf::from(backup),
                dir: PathBuf::from(dir),
                default_user: args.get(3).copied().unwrap_or(DEFAULT_USER).to_string(),
            },
            ["group", backup, name] => Command::Group {
                backup: PathBuf::from(backup),
                name: name.to_string(),
            },
            ["prune-users", dir, valid, move_to] => Command::PruneUsers {
                dir: PathBuf::from(dir),
                valid: PathBuf::from(valid),
                move_to: PathBuf::from(move_to),
            },
            _ => return None,
        };
        Some(command)
    }
}

fn usage(program_name: &str) {
    eprintln!("Usage:");
    eprintln!("  {program_name} translate [FILE]");
    eprintln!("      Translate a page body from FILE or stdin to MoinMoin markup");
    eprintln!("  {program_name} pages [CONFIG]");
    eprintln!(
        "      Write the pages of the configured spaces (default config: {})",
        Config::config_path().display()
    );
    eprintln!("  {program_name} users BACKUP DIR [DEFAULT_USER]");
    eprintln!("      Convert the active users of a Crowd backup into DIR");
    eprintln!("  {program_name} group BACKUP NAME");
    eprintln!("      List the members of a Crowd group");
    eprintln!("  {program_name} prune-users DIR VALID_FILE MOVE_TO");
    eprintln!("      Move users not listed in VALID_FILE from DIR to MOVE_TO");
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    let program_name = args
        .first()
        .cloned()
        .unwrap_or_else(|| "confluence-moin".to_string());

    let Some(command) = Command::parse(args.get(1..).unwrap_or_default()) else {
        usage(&program_name);
        process::exit(1);
    };

    match command {
        Command::Translate { file } => run_translate(file.as_deref()),
        Command::Pages { config } => run_pages(config),
        Command::Users {
            backup,
            dir,
            default_user,
        } => run_users(&backup, &dir, &default_user),
        Command::Group { backup, name } => run_group(&backup, &name),
        Command::PruneUsers {
            dir,
            valid,
            move_to,
        } => run_prune_users(&dir, &valid, &move_to),
    }
}

fn run_translate(file: Option<&Path>) -> Result<()> {
    let body = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut body = String::new();
            io::stdin().read_to_string(&mut body)?;
            body
        }
    };

    let mut stdout = io::stdout().lock();
    translate_to(&body, &mut stdout)?;
    writeln!(stdout)?;
    Ok(())
}

fn run_pages(config_path: Option<PathBuf>) -> Result<()> {
    let loaded = match &config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let config_path = config_path.unwrap_or_else(Config::config_path);
    log::info!("Config path: {}", config_path.display());
    let Some(config) = loaded else {
        bail!("No config file found at {}", config_path.display());
    };

    let users = MoinUsers::read_from_dir(&config.users_dir, &config.default_user)?;

    let mut export = Export::load_from_path(&config.entities_path())?;
    export.rename_spaces(&config.spaces)?;
    export.rename_home_pages()?;

    let prefix = config.page_prefix.as_deref().unwrap_or(DEFAULT_PAGE_PREFIX);
    let writer = PageWriter::new(&config.output_dir)
        .with_export_dir(&config.export_dir)
        .with_page_prefix(prefix, Timestamp::now())
        .with_comment(config.comment.clone());

    let new_keys: Vec<&str> = config.spaces.values().map(String::as_str).collect();
    let summary = writer.write_pages_for_spaces(&export, new_keys, &users)?;
    if summary.failed > 0 {
        log::warn!("{} pages could not be converted", summary.failed);
    }
    Ok(())
}

fn run_users(backup: &Path, dir: &Path, default_user: &str) -> Result<()> {
    let backup = CrowdBackup::load_from_path(backup)?;
    let converted_at = Timestamp::now();

    let written = convert_users(&backup, dir, converted_at)?;
    add_default_user(dir, default_user, converted_at)?;
    log::info!("Converted {} users into {}", written.len(), dir.display());
    Ok(())
}

fn run_group(backup: &Path, name: &str) -> Result<()> {
    let backup = CrowdBackup::load_from_path(backup)?;

    let mut stdout = io::stdout().lock();
    for member in backup.group_members(name) {
        writeln!(stdout, "{member}")?;
    }
    Ok(())
}

fn run_prune_users(dir: &Path, valid: &Path, move_to: &Path) -> Result<()> {
    let valid = users::read_valid_users(valid)?;
    let summary = users::prune_users(dir, &valid, move_to)?;
    log::info!(
        "Kept {} users, moved {} to {}",
        summary.kept.len(),
        summary.moved.len(),
        move_to.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(
            Command::parse(&args(&["translate"])),
            Some(Command::Translate { file: None })
        ));
        assert!(matches!(
            Command::parse(&args(&["pages", "conf.toml"])),
            Some(Command::Pages { config: Some(_) })
        ));
        assert!(matches!(
            Command::parse(&args(&["users", "backup.xml", "user"])),
            Some(Command::Users { default_user, .. }) if default_user == DEFAULT_USER
        ));
        assert!(matches!(
            Command::parse(&args(&["users", "backup.xml", "user", "guest"])),
            Some(Command::Users { default_user, .. }) if default_user == "guest"
        ));
        assert!(matches!(
            Command::parse(&args(&["prune-users", "user", "valid", "disabled"])),
            Some(Command::PruneUsers { .. })
        ));
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        assert!(Command::parse(&args(&[])).is_none());
        assert!(Command::parse(&args(&["group", "backup.xml"])).is_none());
        assert!(Command::parse(&args(&["translate", "a", "b"])).is_none());
        assert!(Command::parse(&args(&["frobnicate"])).is_none());
    }
}
