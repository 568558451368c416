#![allow(dead_code)]

use anyhow::Result;
use data_preparation::{Annotation, AnnotationSet, BBox, Config, Sample};
use image::{DynamicImage, RgbImage};
use std::fs;
use std::path::Path;

/// Writes a black `width`x`height` PNG, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    DynamicImage::ImageRgb8(RgbImage::new(width, height)).save(path)?;
    Ok(())
}

/// Writes `lines` newline-terminated, creating parent directories.
pub fn write_lines(path: &Path, lines: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = lines.join("\n");
    out.push('\n');
    fs::write(path, out)?;
    Ok(())
}

/// Project `demo` under `parent` with classes `[cat, dog]` and progress bars off.
/// `extra` is appended verbatim as more YAML.
pub fn project_config(parent: &Path, input: &str, extra: &str) -> Result<Config> {
    let raw = format!(
        "project: demo\nparent: {}\ninput: {input}\nclasses: [cat, dog]\nprogress: false\n{extra}",
        parent.display()
    );
    Ok(raw.parse()?)
}

/// Raw detection tree: one 16x16 image per entry with a centered box of its class.
pub fn labeled_tree(root: &Path, samples: &[(&str, usize)]) -> Result<()> {
    for (name, class_id) in samples {
        write_png(&root.join(format!("images/{name}.png")), 16, 16)?;
        write_lines(
            &root.join(format!("labels/{name}.txt")),
            &[&format!("{class_id} 0.5 0.5 0.5 0.5")],
        )?;
    }
    Ok(())
}

/// In-memory sample carrying one boxed annotation per class id.
pub fn labeled_sample(name: &str, class_ids: &[usize]) -> Sample {
    let items = class_ids
        .iter()
        .map(|&id| Annotation::class(id, "x").with_bbox(BBox::xcyc(0.5, 0.5, 0.2, 0.2)))
        .collect();
    Sample::new(name).with_annotations(AnnotationSet::inline(name, items))
}

pub fn file_count(dir: &Path) -> Result<usize> {
    Ok(fs::read_dir(dir)?.count())
}
