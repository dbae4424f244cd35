use clap::Parser;
use riscv_emu::config::MEM_SIZE;
use riscv_emu::Cpu;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Program image to run (flat binary or ELF)
    image: PathBuf,

    /// RAM size in MiB
    #[arg(long, default_value_t = MEM_SIZE / (1024 * 1024))]
    mem_mib: usize,

    /// Put the terminal into raw mode while the program runs
    #[arg(long)]
    raw_tty: bool,

    /// Write a machine snapshot here when the run ends
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// `--mem-mib` in bytes, or `None` if it does not fit in `usize`.
fn ram_bytes(mib: usize) -> Option<usize> {
    mib.checked_mul(1024 * 1024)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            // Wrong invocation: show usage and leave without an error status.
            eprintln!("{}", e);
            return Ok(());
        }
        Err(e) => {
            // --help / --version
            e.print()?;
            return Ok(());
        }
    };

    let mem_size = ram_bytes(args.mem_mib)
        .ok_or_else(|| format!("--mem-mib {} is too large", args.mem_mib))?;
    let code = std::fs::read(&args.image)?;

    #[cfg(unix)]
    let _raw_guard = if args.raw_tty {
        Some(riscv_emu::console::RawModeGuard::new()?)
    } else {
        None
    };

    let mut cpu = Cpu::with_ram(&code, mem_size)?;
    let result = cpu.run();

    if let Some(path) = &args.snapshot {
        cpu.snapshot().save(path)?;
        log::info!("snapshot written to {}", path.display());
    }

    result?;
    Ok(())
}
