//! PNG reading and writing with provenance text chunks.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use image::RgbaImage;
use png::{BitDepth, ColorType};

use super::entry::{Provenance, Thumbnail};
use crate::error::{ThumbnailError, ThumbnailResult};

/// Encode `image` as an 8-bit RGBA PNG carrying `provenance` as text chunks.
///
/// Latin-1 values go into `tEXt` chunks. Anything else (a URI with raw
/// non-ASCII characters, for instance) is written as UTF-8 `iTXt`.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn encode_png<W: Write>(
    writer: W,
    image: &RgbaImage,
    provenance: &Provenance,
) -> ThumbnailResult<()> {
    let mut encoder = png::Encoder::new(writer, image.width(), image.height());
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);

    for (key, value) in provenance.text_chunks() {
        if value.chars().all(|c| u32::from(c) <= 0xFF) {
            encoder.add_text_chunk(key.to_string(), value)?;
        } else {
            encoder.add_itxt_chunk(key.to_string(), value)?;
        }
    }

    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())?;
    writer.finish()?;
    Ok(())
}

/// Write a PNG file at `path`. The file is created or truncated.
///
/// # Errors
///
/// Returns an error if the file cannot be created or the image encoded.
pub fn write_png_file(
    path: &Path,
    image: &RgbaImage,
    provenance: &Provenance,
) -> ThumbnailResult<()> {
    let file = File::create(path).map_err(|e| ThumbnailError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    encode_png(&mut writer, image, provenance)?;
    writer.flush().map_err(|e| ThumbnailError::io(path, e))?;
    Ok(())
}

/// Decode a PNG stream to prove it is an image and collect its provenance
/// fields.
///
/// Text chunks are honoured wherever they appear, before or after the image
/// data.
///
/// # Errors
///
/// Returns an error if the stream is not a decodable PNG.
pub fn decode_provenance<R: Read>(reader: R) -> ThumbnailResult<Provenance> {
    let mut reader = png::Decoder::new(reader).read_info()?;

    let mut buf = vec![0; reader.output_buffer_size()];
    reader.next_frame(&mut buf)?;
    // Reads on to IEND so trailing text chunks land in `info()`. A damaged
    // tail after complete image data only costs us those chunks.
    if let Err(e) = reader.finish() {
        log::trace!("Could not read past image data: {}", e);
    }

    let mut provenance = Provenance::default();
    collect_text(reader.info(), &mut provenance);
    Ok(provenance)
}

fn collect_text(info: &png::Info<'_>, provenance: &mut Provenance) {
    for chunk in &info.uncompressed_latin1_text {
        provenance.set_text(&chunk.keyword, chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        if let Ok(text) = chunk.get_text() {
            provenance.set_text(&chunk.keyword, text);
        }
    }
    for chunk in &info.utf8_text {
        if let Ok(text) = chunk.get_text() {
            provenance.set_text(&chunk.keyword, text);
        }
    }
}

/// Read the provenance fields of the PNG at `path`.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or not a PNG.
pub fn read_provenance(path: &Path) -> ThumbnailResult<Provenance> {
    let file = File::open(path).map_err(|e| ThumbnailError::io(path, e))?;
    decode_provenance(BufReader::new(file))
}

/// Load a cached PNG back into memory with its provenance.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or not a PNG.
pub fn read_thumbnail(path: &Path) -> ThumbnailResult<(Thumbnail, Provenance)> {
    let provenance = read_provenance(path)?;
    let image = image::open(path)?;
    let mut thumbnail = Thumbnail::from_dynamic(image);
    if let (Some(w), Some(h)) = (provenance.width, provenance.height) {
        thumbnail = thumbnail.with_original_size(w, h);
    }
    Ok((thumbnail, provenance))
}
