//! Media types of assets and links.

/// Short aliases usable as `type-as` in asset rules.
pub const MEDIA_TYPES: [(&str, &str); 10] = [
    ("text", "text/plain"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("yaml", "text/x-yaml"),
    ("zip", "application/zip"),
    ("geotiff", "image/tiff; application=geotiff"),
    ("cog", "image/tiff; application=geotiff; profile=cloud-optimized"),
    ("geojson", "application/geo+json"),
    ("compose", "text/x-yaml; application=compose"),
    ("notebook", "application/x-ipynb+json"),
];

const EXTENSIONS: [(&str, &str); 30] = [
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/vnd.microsoft.icon"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("json", "application/json"),
    ("geojson", "application/geo+json"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("tar", "application/x-tar"),
    ("gz", "application/gzip"),
    ("bz2", "application/x-bzip2"),
    ("nc", "application/netcdf"),
    ("h5", "application/x-hdf5"),
    ("ipynb", "application/x-ipynb+json"),
    ("onnx", "application/octet-stream"),
    ("pt", "application/octet-stream"),
    ("parquet", "application/vnd.apache.parquet"),
];

/// Media type of a `type-as` alias.
#[must_use]
pub fn from_alias(alias: &str) -> Option<&'static str> {
    MEDIA_TYPES
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, media_type)| *media_type)
}

/// Media type guessed from the extension of a path or URL.
///
/// Query and fragment are ignored; a compressed tarball counts as a tarball.
#[must_use]
pub fn guess(path: &str) -> Option<&'static str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tar.bz2") {
        return Some("application/x-tar");
    }
    let (_, extension) = name.rsplit_once('.')?;
    EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, media_type)| *media_type)
}
