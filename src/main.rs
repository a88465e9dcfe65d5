//! depot - interactive client for the depot file intake service.
//!
//! Connects, authenticates, then streams one file into the chosen
//! department. Anything not given as a flag is prompted for.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use depot::client::Client;
use depot::department::Department;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Depot - send a file to a department share"
)]
struct Args {
    /// File to transfer (prompted for when omitted)
    file: Option<PathBuf>,

    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Username (prompted for when omitted)
    #[arg(short, long)]
    user: Option<String>,

    /// Destination department (menu shown when omitted)
    #[arg(short, long, value_parser = parse_department)]
    department: Option<Department>,
}

fn parse_department(s: &str) -> Result<Department, String> {
    Department::from_name(s).ok_or_else(|| {
        let names: Vec<&str> = Department::ALL.iter().map(|d| d.name()).collect();
        format!("unknown department '{s}' (expected one of: {})", names.join(", "))
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    println!("Connecting to server at {}:{}...", args.host, args.port);
    let mut client = Client::connect(&args.host, args.port).await?;
    println!("Connected to server.");

    let username = match args.user {
        Some(user) => user,
        None => prompt("Username: ")?,
    };
    let password = prompt("Password: ")?;

    let response = client.authenticate(&username, &password).await?;
    println!("Server response: {response}");
    if !response.starts_with("Authentication successful") {
        bail!("Authentication failed.");
    }

    let file = match args.file {
        Some(file) => file,
        None => PathBuf::from(prompt("Enter the file path to transfer: ")?),
    };
    let department = match args.department {
        Some(dept) => dept,
        None => department_menu()?,
    };

    println!("Transferring '{}'...", file.display());
    let response = client.send_file(department, &file).await?;
    println!("Server response: {response}");
    if !response.starts_with("File '") {
        bail!("File transfer failed.");
    }
    println!("File transfer completed successfully.");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    let n = std::io::stdin().lock().read_line(&mut line)?;
    if n == 0 {
        bail!("stdin closed");
    }
    Ok(line.trim().to_string())
}

fn department_menu() -> Result<Department> {
    loop {
        println!("\nSelect destination department:");
        for (i, dept) in Department::ALL.iter().enumerate() {
            println!("{}. {}", i + 1, dept);
        }
        let choice = prompt("Choice: ")?;
        match choice.parse::<usize>() {
            Ok(n) if (1..=Department::ALL.len()).contains(&n) => {
                return Ok(Department::ALL[n - 1]);
            }
            _ => println!("Invalid choice. Please try again."),
        }
    }
}
