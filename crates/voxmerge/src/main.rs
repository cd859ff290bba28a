//! Merges the models of several MagicaVoxel files into one.
//!
//! Run with: `cargo run -p voxmerge -- main.vox extra1.vox extra2.vox`

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use voxmerge_config::{CliArgs, Config};
use voxmerge_vox::{Container, MergeOptions, VoxError};

/// Loads `main`, merges every file of `others` into it in order, and writes
/// the result to the configured output path.
fn run(main: &Path, others: &[PathBuf], config: &Config) -> Result<Container, VoxError> {
    let options = MergeOptions {
        preserve_material_category: config.merge.preserve_material_category,
    };

    let mut target = Container::open(main)?;
    info!(summary = ?target.summary(), "main file");

    for path in others {
        let source = Container::open(path)?;
        let reports = target.merge(source, options)?;
        for report in &reports {
            info!(
                file = %path.display(),
                transform_id = report.transform_id,
                model_id = report.model_id,
                colors_allocated = report.colors_allocated,
                colors_matched = report.colors_matched,
                "grafted shape"
            );
        }
    }

    target.save(&config.merge.output, config.merge.format_version)?;
    info!(summary = ?target.summary(), "merge complete");
    Ok(target)
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = voxmerge_config::resolve_config_dir(args.config.as_deref());

    let mut config = config_dir
        .as_deref()
        .map_err(|e| e.to_string())
        .and_then(|dir| Config::load_or_create(dir).map_err(|e| e.to_string()))
        .unwrap_or_else(|e| {
            eprintln!("Failed to load config: {e}, using defaults");
            Config::default()
        });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.ok().map(|dir| dir.join("logs"));
    voxmerge_log::init_logging(log_dir.as_deref(), cfg!(debug_assertions), Some(&config));

    if let Err(e) = run(&args.filename, &args.files, &config) {
        error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxmerge_vox::{
        Chunk, ChunkBody, ChunkTag, Dict, GroupNode, Palette, ShapeNode, SizeChunk,
        TransformNode, Voxel, VoxelChunk,
    };

    /// One-model scene with a single voxel of color index `color`.
    fn write_scene(path: &Path, color: u8) {
        let children = vec![
            Chunk::new(ChunkBody::Size(SizeChunk { x: 1, y: 1, z: 1 })),
            Chunk::new(ChunkBody::Voxels(VoxelChunk {
                voxels: vec![Voxel {
                    x: 0,
                    y: 0,
                    z: 0,
                    color_index: color,
                }],
            })),
            Chunk::new(ChunkBody::Transform(TransformNode {
                node_id: 0,
                attributes: Dict::new(),
                child_node_id: 1,
                layer_id: -1,
                frame: Dict::new(),
            })),
            Chunk::new(ChunkBody::Group(GroupNode {
                node_id: 1,
                attributes: Dict::new(),
                child_ids: vec![2],
            })),
            Chunk::new(ChunkBody::Transform(TransformNode {
                node_id: 2,
                attributes: Dict::new(),
                child_node_id: 3,
                layer_id: 0,
                frame: Dict::new(),
            })),
            Chunk::new(ChunkBody::Shape(ShapeNode {
                node_id: 3,
                attributes: Dict::new(),
                model_id: 0,
                model_attributes: Dict::new(),
            })),
            Chunk::new(ChunkBody::Palette(Palette::default())),
        ];
        let root = Chunk {
            body: ChunkBody::Opaque {
                tag: ChunkTag::MAIN,
                payload: Vec::new(),
            },
            children,
        };
        let container = Container::from_root(200, root).unwrap();
        container.save(path, 200).unwrap();
    }

    fn config_with_output(output: PathBuf) -> Config {
        let mut config = Config::default();
        config.merge.output = output;
        config
    }

    #[test]
    fn test_run_merges_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.vox");
        let a = dir.path().join("a.vox");
        let b = dir.path().join("b.vox");
        write_scene(&main, 6);
        write_scene(&a, 6);
        write_scene(&b, 20);

        let config = config_with_output(dir.path().join("output.vox"));
        let merged = run(&main, &[a, b], &config).unwrap();
        assert_eq!(merged.shapes().len(), 3);
        assert_eq!(merged.group().child_ids, [2, 4, 6]);

        let written = Container::open(&config.merge.output).unwrap();
        assert_eq!(written.shapes().len(), 3);
        let indices: Vec<u8> = written
            .voxel_chunks()
            .map(|c| c.voxels[0].color_index)
            .collect();
        assert_eq!(indices, [6, 2, 10]);
    }

    #[test]
    fn test_run_without_secondaries_rewrites_main() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.vox");
        write_scene(&main, 6);

        let config = config_with_output(dir.path().join("output.vox"));
        run(&main, &[], &config).unwrap();
        assert_eq!(
            std::fs::read(&main).unwrap(),
            std::fs::read(&config.merge.output).unwrap()
        );
    }

    #[test]
    fn test_run_aborts_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.vox");
        let bad = dir.path().join("bad.vox");
        write_scene(&main, 6);
        std::fs::write(&bad, b"PNG\x00garbage").unwrap();

        let config = config_with_output(dir.path().join("output.vox"));
        let result = run(&main, &[bad], &config);
        assert!(matches!(result, Err(VoxError::InvalidMagic { .. })));
        assert!(!config.merge.output.exists());
    }
}
