//! Main entry point for the zipvfs CLI application.
//!
//! Mounts a list of ZIP archives as one file system and lists or prints
//! entries from it.

use std::io::Read;

use anyhow::{Result, bail};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;

use zipvfs::{ArchiveVfs, Cli};

/// Application entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let vfs = ArchiveVfs::open(&cli.archives, &Handle::current(), cli.options());
    if vfs.archive_count() == 0 {
        bail!("none of the given archives could be opened");
    }

    // Printing can be served by the fallback; everything else needs the index.
    if !cli.no_wait || cli.list || cli.verbose || cli.count {
        vfs.wait_until_ready().await;
    }

    let result = run(&vfs, &cli).await;
    vfs.close();
    result
}

async fn run(vfs: &ArchiveVfs, cli: &Cli) -> Result<()> {
    if cli.list || cli.verbose {
        list_entries(vfs, cli.verbose);
    }

    if cli.count {
        println!("{}", vfs.entry_count());
    }

    for path in &cli.print {
        print_entry(vfs, path).await?;
    }

    Ok(())
}

/// List indexed entries.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just paths, one per line
/// - Verbose format (`-v`): Table with size, compression ratio, timestamps and archive
fn list_entries(vfs: &ArchiveVfs, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for path in vfs.paths() {
        if !verbose {
            println!("{path}");
            continue;
        }
        let Some(entry) = vfs.entry(&path) else {
            continue;
        };
        let meta = &entry.meta;

        let (year, month, day) = meta.mod_date();
        let (hour, minute, _second) = meta.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}  ({})",
            meta.uncompressed_size,
            meta.compressed_size,
            ratio(meta.compressed_size, meta.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.path(),
            entry.archive.path().display()
        );

        if !meta.is_directory {
            total_uncompressed += meta.uncompressed_size;
            total_compressed += meta.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }
}

/// Compression ratio as percentage saved.
///
/// Entries that grew are shown as negative savings, floored at -999%.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        let kept = compressed as u128 * 100 / uncompressed as u128;
        let saved = 100 - kept.min(1099) as i64;
        format!("{:>4}%", saved)
    } else {
        "  0%".to_string()
    }
}

/// Stream one entry to stdout.
async fn print_entry(vfs: &ArchiveVfs, path: &str) -> Result<()> {
    let Some(mut stream) = vfs.get_stream(path)? else {
        bail!("{path}: no such entry");
    };

    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n]).await?;
    }
    stdout.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_stays_in_range() {
        assert_eq!(ratio(50, 100), "  50%");
        assert_eq!(ratio(0, 0), "  0%");
        assert_eq!(ratio(120, 100), " -20%");
        assert_eq!(ratio(u64::MAX, 1), "-999%");
        assert_eq!(ratio(u64::MAX, u64::MAX), "   0%");
    }
}
