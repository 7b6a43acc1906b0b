use std::env;
use std::fs::OpenOptions;
use std::process;

use ext2img::Volume;

fn main() {
    let args: Vec<String> = env::args().collect();

    let (symbolic, image, target, link_path) = match args.len() {
        4 => (false, &args[1], args[2].as_str(), &args[3]),
        5 if args[2] == "-s" => (true, &args[1], args[3].as_str(), &args[4]),
        _ => {
            eprintln!("Usage: {} <image file name> [-s] <target> <link path>", args[0]);
            process::exit(1);
        }
    };

    let file = OpenOptions::new().read(true).write(true).open(image).unwrap_or_else(|e| {
        eprintln!("{image}: {e}");
        process::exit(1);
    });
    let mmap = unsafe { memmap2::MmapOptions::new().map_mut(&file) }.unwrap_or_else(|e| {
        eprintln!("mmap: {e}");
        process::exit(1);
    });

    let mut vol = Volume::new(mmap);
    let result = if symbolic {
        ext2img::ops::symlink(&mut vol, target.as_bytes(), link_path)
    } else {
        ext2img::ops::hard_link(&mut vol, target, link_path)
    };
    if let Err(e) = result {
        eprintln!("{link_path}: {e}");
        process::exit(e.errno());
    }
}
