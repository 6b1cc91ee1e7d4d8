use image::ImageReader;
use nalgebra::Matrix3;
use quadtag::{gray_view, pose, render, Detector, DetectorConfig, TagFamily, TagRecord};

/// Paint a 36h11 tag so the example runs without an input image.
fn synthetic_tag(id: u32, scale: usize) -> image::GrayImage {
    let family = TagFamily::Tag36h11;
    let grid = family.grid_size();
    let cells = grid + 2;
    let margin = 3 * scale;
    let size = (cells * scale + 2 * margin) as u32;
    let code = family.code(id).expect("id in range");

    let mut img = image::GrayImage::from_pixel(size, size, image::Luma([255u8]));
    for row in 0..cells {
        for col in 0..cells {
            let on_border = row == 0 || col == 0 || row == cells - 1 || col == cells - 1;
            let dark = on_border || (code >> ((row - 1) * grid + (col - 1))) & 1 == 1;
            if dark {
                for y in 0..scale {
                    for x in 0..scale {
                        let px = (margin + col * scale + x) as u32;
                        let py = (margin + row * scale + y) as u32;
                        img.put_pixel(px, py, image::Luma([0u8]));
                    }
                }
            }
        }
    }
    img
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    quadtag::init_with_level(log::LevelFilter::Debug)?;

    let gray = match std::env::args().nth(1) {
        Some(path) => ImageReader::open(path)?.decode()?.to_luma8(),
        None => {
            eprintln!("no image given, using a synthetic 36h11 tag (id 7)");
            synthetic_tag(7, 16)
        }
    };
    let view = gray_view(&gray);

    let detector = Detector::new(DetectorConfig::default());
    let tags = detector.detect(&view)?;
    println!("found {} tag(s)", tags.len());

    // A rough pinhole guess; pass real calibration for meaningful poses.
    let f = f64::from(gray.width());
    let k = Matrix3::new(
        f,
        0.0,
        f64::from(gray.width()) / 2.0,
        0.0,
        f,
        f64::from(gray.height()) / 2.0,
        0.0,
        0.0,
        1.0,
    );

    let mut with_poses = Vec::with_capacity(tags.len());
    for tag in &tags {
        let tag = pose::estimate(tag, &k, &[], 0.16)?;
        println!("{}", serde_json::to_string_pretty(&TagRecord::from(&tag))?);
        with_poses.push(tag);
    }

    let mut overlay = image::DynamicImage::ImageLuma8(gray).to_rgb8();
    render::draw_detections(&mut overlay, &with_poses);
    overlay.save("detections.png")?;
    println!("overlay written to detections.png");

    Ok(())
}
