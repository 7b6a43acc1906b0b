use std::env;
use std::fs::OpenOptions;
use std::process;

use ext2img::Volume;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <image file name> <absolute path to restore>", args[0]);
        process::exit(1);
    }

    let file = OpenOptions::new().read(true).write(true).open(&args[1]).unwrap_or_else(|e| {
        eprintln!("{}: {e}", args[1]);
        process::exit(1);
    });
    let mmap = unsafe { memmap2::MmapOptions::new().map_mut(&file) }.unwrap_or_else(|e| {
        eprintln!("mmap: {e}");
        process::exit(1);
    });

    let mut vol = Volume::new(mmap);
    if let Err(e) = ext2img::ops::restore(&mut vol, &args[2]) {
        eprintln!("{}: {e}", args[2]);
        process::exit(e.errno());
    }
}
