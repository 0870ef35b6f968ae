use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float64Array};
use arrow::datatypes::DataType;
use ndarray::{IxDyn, OwnedRepr};
use ndarray_npy::NpzReader;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{ElementType, MetricsBundle, NamedArray};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a metrics bundle from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.npz`     – NumPy archive of named arrays (what the evaluation writes)
/// * `.json`    – `{ "centers": [...], "fids": [...], ... }`
/// * `.csv`     – one column per key, shorter columns padded with blanks
/// * `.parquet` – one numeric column per key
pub fn load_file(path: &Path) -> Result<MetricsBundle> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "npz" => load_npz(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// NPZ loader
// ---------------------------------------------------------------------------

fn load_npz(path: &Path) -> Result<MetricsBundle> {
    let file = File::open(path).context("opening npz file")?;
    let mut npz = NpzReader::new(file).context("reading npz archive")?;
    let entries = npz.names().context("listing npz entries")?;

    let mut arrays = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.strip_suffix(".npy").unwrap_or(&entry).to_string();
        let (dtype, shape, values) =
            read_npz_entry(&mut npz, &entry).with_context(|| format!("reading array '{name}'"))?;
        arrays.push(NamedArray::new(name, dtype, shape, values));
    }

    Ok(MetricsBundle::from_arrays(path, arrays))
}

/// Read one entry, trying each supported element type in turn.
fn read_npz_entry<R: Read + Seek>(
    npz: &mut NpzReader<R>,
    entry: &str,
) -> Result<(ElementType, Vec<usize>, Vec<f64>)> {
    macro_rules! try_as {
        ($t:ty, $dtype:expr) => {
            if let Ok(arr) = npz.by_name::<OwnedRepr<$t>, IxDyn>(entry) {
                let values = arr.iter().map(|&v| v as f64).collect();
                return Ok(($dtype, arr.shape().to_vec(), values));
            }
        };
    }

    try_as!(f64, ElementType::Float64);
    try_as!(f32, ElementType::Float32);
    try_as!(i64, ElementType::Int64);
    try_as!(i32, ElementType::Int32);
    try_as!(i16, ElementType::Int16);
    try_as!(i8, ElementType::Int8);
    try_as!(u64, ElementType::UInt64);
    try_as!(u32, ElementType::UInt32);
    try_as!(u16, ElementType::UInt16);
    try_as!(u8, ElementType::UInt8);

    if let Ok(arr) = npz.by_name::<OwnedRepr<bool>, IxDyn>(entry) {
        let values = arr.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
        return Ok((ElementType::Bool, arr.shape().to_vec(), values));
    }

    bail!("unsupported element type")
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (one array per key):
///
/// ```json
/// {
///   "centers": [0.0, 0.1, ...],
///   "fids":    [0.52, 0.48, ...]
/// }
/// ```
fn load_json(path: &Path) -> Result<MetricsBundle> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let object = root
        .as_object()
        .context("Expected top-level JSON object")?;

    let mut arrays = Vec::with_capacity(object.len());
    for (key, val) in object {
        let Some(items) = val.as_array() else {
            log::warn!("JSON key '{key}' is not an array, skipping");
            continue;
        };
        let values = items
            .iter()
            .enumerate()
            .map(|(j, v)| {
                v.as_f64()
                    .with_context(|| format!("{key}[{j}]: not a number"))
            })
            .collect::<Result<Vec<f64>>>()?;
        let dtype = if items.iter().all(|v| v.is_i64() || v.is_u64()) && !items.is_empty() {
            ElementType::Int64
        } else {
            ElementType::Float64
        };
        let shape = vec![values.len()];
        arrays.push(NamedArray::new(key.clone(), dtype, shape, values));
    }

    Ok(MetricsBundle::from_arrays(path, arrays))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with key names, one column per array.
/// A blank cell ends its column, so arrays of different lengths fit in one file.
fn load_csv(path: &Path) -> Result<MetricsBundle> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut integral = vec![true; headers.len()];
    let mut ended = vec![false; headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, cell) in record.iter().enumerate().take(headers.len()) {
            let cell = cell.trim();
            if cell.is_empty() {
                ended[col_idx] = true;
                continue;
            }
            if ended[col_idx] {
                bail!(
                    "CSV row {row_no}: column '{}' continues after a blank cell",
                    headers[col_idx]
                );
            }
            if cell.parse::<i64>().is_err() {
                integral[col_idx] = false;
            }
            let v = cell
                .parse::<f64>()
                .with_context(|| format!("Row {row_no}, {}: '{cell}' is not a number", headers[col_idx]))?;
            columns[col_idx].push(v);
        }
    }

    let arrays = headers
        .into_iter()
        .zip(columns)
        .zip(integral)
        .map(|((name, values), integral)| {
            let dtype = if integral && !values.is_empty() {
                ElementType::Int64
            } else {
                ElementType::Float64
            };
            let shape = vec![values.len()];
            NamedArray::new(name, dtype, shape, values)
        })
        .collect();

    Ok(MetricsBundle::from_arrays(path, arrays))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet table whose numeric columns are bundle arrays.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).  Nulls become NaN; non-numeric columns
/// are skipped.
fn load_parquet(path: &Path) -> Result<MetricsBundle> {
    let file = File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: BTreeMap<String, (ElementType, Vec<f64>)> = BTreeMap::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        for (idx, field) in schema.fields().iter().enumerate() {
            let Some(dtype) = arrow_element_type(field.data_type()) else {
                log::warn!(
                    "Parquet column '{}' has non-numeric type {:?}, skipping",
                    field.name(),
                    field.data_type()
                );
                continue;
            };
            let values = column_as_f64(batch.column(idx))
                .with_context(|| format!("reading column '{}'", field.name()))?;
            columns
                .entry(field.name().clone())
                .or_insert_with(|| (dtype, Vec::new()))
                .1
                .extend(values);
        }
    }

    let arrays = columns
        .into_iter()
        .map(|(name, (dtype, values))| {
            let shape = vec![values.len()];
            NamedArray::new(name, dtype, shape, values)
        })
        .collect();

    Ok(MetricsBundle::from_arrays(path, arrays))
}

// -- Parquet / Arrow helpers --

fn arrow_element_type(dt: &DataType) -> Option<ElementType> {
    Some(match dt {
        DataType::Float64 => ElementType::Float64,
        DataType::Float32 => ElementType::Float32,
        DataType::Int64 => ElementType::Int64,
        DataType::Int32 => ElementType::Int32,
        DataType::Int16 => ElementType::Int16,
        DataType::Int8 => ElementType::Int8,
        DataType::UInt64 => ElementType::UInt64,
        DataType::UInt32 => ElementType::UInt32,
        DataType::UInt16 => ElementType::UInt16,
        DataType::UInt8 => ElementType::UInt8,
        DataType::Boolean => ElementType::Bool,
        _ => return None,
    })
}

fn column_as_f64(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    let cast = arrow::compute::cast(col, &DataType::Float64).context("casting to Float64")?;
    let floats = cast
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("expected Float64Array after cast")?;
    Ok(floats.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use ndarray_npy::NpzWriter;

    #[test]
    fn npz_arrays_keep_dtype_and_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.npz");
        {
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("centers", &Array1::from(vec![0.0f64, 10.0, 20.0]))
                .unwrap();
            npz.add_array("nrealimgs", &Array1::from(vec![4i64, 5, 6]))
                .unwrap();
            npz.add_array("grid", &Array2::<f32>::zeros((2, 3))).unwrap();
            npz.finish().unwrap();
        }

        let bundle = load_file(&path).unwrap();
        assert_eq!(bundle.len(), 3);

        let centers = bundle.get("centers").unwrap();
        assert_eq!(centers.dtype, ElementType::Float64);
        assert_eq!(centers.values, vec![0.0, 10.0, 20.0]);

        let counts = bundle.get("nrealimgs").unwrap();
        assert_eq!(counts.dtype, ElementType::Int64);
        assert_eq!(counts.values, vec![4.0, 5.0, 6.0]);

        let grid = bundle.get("grid").unwrap();
        assert_eq!(grid.dtype, ElementType::Float32);
        assert_eq!(grid.shape, vec![2, 3]);
    }

    #[test]
    fn json_object_of_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(
            &path,
            r#"{"centers": [0, 1, 2], "fids": [0.5, 0.25, 0.125], "note": "x"}"#,
        )
        .unwrap();

        let bundle = load_file(&path).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get("centers").unwrap().dtype, ElementType::Int64);
        assert_eq!(bundle.get("fids").unwrap().values, vec![0.5, 0.25, 0.125]);
    }

    #[test]
    fn csv_columns_may_differ_in_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.csv");
        std::fs::write(&path, "centers,fids\n0,1.5\n10,2.5\n20,\n").unwrap();

        let bundle = load_file(&path).unwrap();
        assert_eq!(bundle.get("centers").unwrap().len(), 3);
        assert_eq!(bundle.get("fids").unwrap().values, vec![1.5, 2.5]);
    }

    #[test]
    fn parquet_nulls_become_nan() {
        use arrow::array::{Int32Array, StringArray};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("centers", DataType::Int32, false),
            Field::new("fids", DataType::Float64, true),
            Field::new("tag", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![0, 1, 2])),
                Arc::new(Float64Array::from(vec![Some(0.5), None, Some(0.25)])),
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let bundle = load_file(&path).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get("centers").unwrap().dtype, ElementType::Int32);
        let fids = &bundle.get("fids").unwrap().values;
        assert_eq!(fids[0], 0.5);
        assert!(fids[1].is_nan());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("bundle.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
