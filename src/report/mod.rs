use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

use crate::dataset::{
    Dataset, DatasetValidation, CATEGORY_SEPARATOR, COL_CATEGORIES, COL_CLEAN_TEXT, COL_DATE,
    COL_KEY_PHRASE, COL_PLACE, COL_RATING, COL_SENTIMENT, COL_SUBJECTIVITY, COL_TOPIC,
    SENTIMENT_NEGATIVE, SENTIMENT_NEUTRAL, SENTIMENT_POSITIVE,
};
use crate::error::Result;

/// The insight report consumed by the dashboard.
///
/// The top-level key set is fixed: consumers may rely on every key being
/// present in every report, with `null` standing in for facets whose source
/// column has not been produced yet. Field names stay in Spanish because
/// they are the JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
    pub fecha_generacion: String,
    pub informe_generado: bool,
    pub validacion_dataset: DatasetValidation,
    pub kpis: Option<Kpis>,
    pub fortalezas: Vec<String>,
    pub debilidades: Vec<String>,
    pub resumenes: Vec<PlaceSummary>,
    pub estadisticas_dataset: DatasetStats,
}

/// Headline numbers for the dashboard cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpis {
    pub total_reviews: usize,
    pub porcentaje_positivas: f64,
    pub porcentaje_negativas: f64,
    pub calificacion_promedio: Option<f64>,
    pub lugares_distintos: usize,
}

/// One entry per place, ordered by review volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub lugar: String,
    pub total: usize,
    pub calificacion_promedio: Option<f64>,
    pub sentimiento_dominante: Option<String>,
    pub frase_destacada: Option<String>,
}

/// Per-facet statistics. Every facet key is always serialized; a facet is
/// `null` exactly when the column it is derived from is not in the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub sentimiento: Option<ValueCounts>,
    pub subjetividad: Option<ValueCounts>,
    pub categorias: Option<ValueCounts>,
    pub topicos: Option<ValueCounts>,
    pub rango_temporal: Option<TemporalRange>,
    pub calificacion: Option<RatingStats>,
    pub longitud_texto: Option<TextLengthStats>,
}

impl DatasetStats {
    pub fn empty() -> Self {
        Self {
            sentimiento: None,
            subjetividad: None,
            categorias: None,
            topicos: None,
            rango_temporal: None,
            calificacion: None,
            longitud_texto: None,
        }
    }
}

/// Counts and percentages for one categorical column. For multi-label
/// columns the percentages are relative to rows, so they may sum past 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueCounts {
    pub total: usize,
    pub conteo: BTreeMap<String, usize>,
    pub porcentaje: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalRange {
    pub desde: Option<String>,
    pub hasta: Option<String>,
    pub total_con_fecha: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingStats {
    pub total_validas: usize,
    pub promedio: Option<f64>,
    pub minimo: Option<f64>,
    pub maximo: Option<f64>,
    pub distribucion: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLengthStats {
    pub promedio_palabras: f64,
    pub minimo_palabras: usize,
    pub maximo_palabras: usize,
}

/// Serializes `value` pretty-printed through a sibling temp file, then
/// renames it over `path`. Every JSON artifact the pipeline emits goes
/// through here so consumers never see a torn file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl InsightReport {
    /// The shell written when sentiment analysis first runs: every key in
    /// place, nothing computed yet.
    pub fn skeleton(validation: DatasetValidation) -> Self {
        Self {
            fecha_generacion: Utc::now().to_rfc3339(),
            informe_generado: false,
            validacion_dataset: validation,
            kpis: None,
            fortalezas: Vec::new(),
            debilidades: Vec::new(),
            resumenes: Vec::new(),
            estadisticas_dataset: DatasetStats::empty(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Full rewrite; consumers never observe a partially written report.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

/// Builds the complete report from the enriched dataset. Facets for columns
/// the dataset does not carry come back as `None`.
pub fn build(
    dataset: &Dataset,
    validation: DatasetValidation,
    min_category_mentions: usize,
) -> InsightReport {
    let stats = DatasetStats {
        sentimiento: single_value_counts(dataset, COL_SENTIMENT),
        subjetividad: single_value_counts(dataset, COL_SUBJECTIVITY),
        categorias: category_counts(dataset),
        topicos: single_value_counts(dataset, COL_TOPIC),
        rango_temporal: temporal_range(dataset),
        calificacion: rating_stats(dataset),
        longitud_texto: text_length_stats(dataset),
    };
    let (fortalezas, debilidades) = strengths_and_weaknesses(dataset, min_category_mentions);

    InsightReport {
        fecha_generacion: Utc::now().to_rfc3339(),
        informe_generado: true,
        validacion_dataset: validation,
        kpis: Some(kpis(dataset, &stats)),
        fortalezas,
        debilidades,
        resumenes: place_summaries(dataset),
        estadisticas_dataset: stats,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(count as f64 * 100.0 / total as f64)
    }
}

pub(crate) fn single_value_counts(dataset: &Dataset, column: &str) -> Option<ValueCounts> {
    let values = dataset.column(column)?;
    let total = values.len();
    let mut conteo: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        *conteo.entry(value.to_string()).or_insert(0) += 1;
    }
    let porcentaje = conteo
        .iter()
        .map(|(k, v)| (k.clone(), percentage(*v, total)))
        .collect();
    Some(ValueCounts {
        total,
        conteo,
        porcentaje,
    })
}

pub(crate) fn category_counts(dataset: &Dataset) -> Option<ValueCounts> {
    let values = dataset.column(COL_CATEGORIES)?;
    let total = values.len();
    let mut conteo: BTreeMap<String, usize> = BTreeMap::new();
    for cell in values {
        for label in cell.split(CATEGORY_SEPARATOR) {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            *conteo.entry(label.to_string()).or_insert(0) += 1;
        }
    }
    let porcentaje = conteo
        .iter()
        .map(|(k, v)| (k.clone(), percentage(*v, total)))
        .collect();
    Some(ValueCounts {
        total,
        conteo,
        porcentaje,
    })
}

/// Accepts the date spellings the scraper has been seen to emit.
pub fn parse_review_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    None
}

fn temporal_range(dataset: &Dataset) -> Option<TemporalRange> {
    let values = dataset.column(COL_DATE)?;
    let mut dates: Vec<NaiveDate> = values.iter().filter_map(|v| parse_review_date(v)).collect();
    dates.sort();
    Some(TemporalRange {
        desde: dates.first().map(|d| d.format("%Y-%m-%d").to_string()),
        hasta: dates.last().map(|d| d.format("%Y-%m-%d").to_string()),
        total_con_fecha: dates.len(),
    })
}

pub(crate) fn rating_stats(dataset: &Dataset) -> Option<RatingStats> {
    let values = dataset.column(COL_RATING)?;
    let ratings: Vec<f64> = values
        .iter()
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .filter(|r| r.is_finite())
        .collect();
    let mut distribucion: BTreeMap<String, usize> = BTreeMap::new();
    for rating in &ratings {
        let bucket = format!("{}", rating.round() as i64);
        *distribucion.entry(bucket).or_insert(0) += 1;
    }
    let promedio = if ratings.is_empty() {
        None
    } else {
        Some(round2(ratings.iter().sum::<f64>() / ratings.len() as f64))
    };
    let minimo = ratings.iter().cloned().fold(None, |acc: Option<f64>, r| {
        Some(acc.map_or(r, |a| a.min(r)))
    });
    let maximo = ratings.iter().cloned().fold(None, |acc: Option<f64>, r| {
        Some(acc.map_or(r, |a| a.max(r)))
    });
    Some(RatingStats {
        total_validas: ratings.len(),
        promedio,
        minimo,
        maximo,
        distribucion,
    })
}

fn text_length_stats(dataset: &Dataset) -> Option<TextLengthStats> {
    let values = dataset.column(COL_CLEAN_TEXT)?;
    let lengths: Vec<usize> = values.iter().map(|v| v.unicode_words().count()).collect();
    if lengths.is_empty() {
        return Some(TextLengthStats {
            promedio_palabras: 0.0,
            minimo_palabras: 0,
            maximo_palabras: 0,
        });
    }
    let sum: usize = lengths.iter().sum();
    Some(TextLengthStats {
        promedio_palabras: round2(sum as f64 / lengths.len() as f64),
        minimo_palabras: *lengths.iter().min().unwrap_or(&0),
        maximo_palabras: *lengths.iter().max().unwrap_or(&0),
    })
}

/// A category is a strength when enough reviews mention it and most of them
/// are positive, a weakness when most are negative.
fn strengths_and_weaknesses(
    dataset: &Dataset,
    min_category_mentions: usize,
) -> (Vec<String>, Vec<String>) {
    let categories = match dataset.column(COL_CATEGORIES) {
        Some(v) => v,
        None => return (Vec::new(), Vec::new()),
    };
    let sentiments = match dataset.column(COL_SENTIMENT) {
        Some(v) => v,
        None => return (Vec::new(), Vec::new()),
    };

    let mut mentions: BTreeMap<String, (usize, usize, usize)> = BTreeMap::new();
    for (cell, sentiment) in categories.iter().zip(&sentiments) {
        for label in cell.split(CATEGORY_SEPARATOR) {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            let entry = mentions.entry(label.to_string()).or_insert((0, 0, 0));
            entry.0 += 1;
            if *sentiment == SENTIMENT_POSITIVE {
                entry.1 += 1;
            } else if *sentiment == SENTIMENT_NEGATIVE {
                entry.2 += 1;
            }
        }
    }

    let mut fortalezas = Vec::new();
    let mut debilidades = Vec::new();
    for (label, (total, positives, negatives)) in mentions {
        if total < min_category_mentions {
            continue;
        }
        let positive_ratio = positives as f64 / total as f64;
        let negative_ratio = negatives as f64 / total as f64;
        if positive_ratio >= 0.6 {
            fortalezas.push(format!(
                "{}: {:.0}% de menciones positivas ({} reseñas)",
                label,
                positive_ratio * 100.0,
                total
            ));
        } else if negative_ratio >= 0.4 {
            debilidades.push(format!(
                "{}: {:.0}% de menciones negativas ({} reseñas)",
                label,
                negative_ratio * 100.0,
                total
            ));
        }
    }
    (fortalezas, debilidades)
}

fn place_summaries(dataset: &Dataset) -> Vec<PlaceSummary> {
    let places = match dataset.column(COL_PLACE) {
        Some(v) => v,
        None => return Vec::new(),
    };
    let ratings = dataset.column(COL_RATING);
    let sentiments = dataset.column(COL_SENTIMENT);
    let phrases = dataset.column(COL_KEY_PHRASE);

    struct Acc {
        total: usize,
        rating_sum: f64,
        rating_count: usize,
        sentiment_counts: BTreeMap<String, usize>,
        phrase: Option<String>,
    }

    let mut by_place: BTreeMap<String, Acc> = BTreeMap::new();
    for (row, place) in places.iter().enumerate() {
        let place = place.trim();
        if place.is_empty() {
            continue;
        }
        let acc = by_place.entry(place.to_string()).or_insert(Acc {
            total: 0,
            rating_sum: 0.0,
            rating_count: 0,
            sentiment_counts: BTreeMap::new(),
            phrase: None,
        });
        acc.total += 1;
        if let Some(ratings) = &ratings {
            if let Ok(r) = ratings[row].trim().parse::<f64>() {
                if r.is_finite() {
                    acc.rating_sum += r;
                    acc.rating_count += 1;
                }
            }
        }
        if let Some(sentiments) = &sentiments {
            let s = sentiments[row].trim();
            if !s.is_empty() {
                *acc.sentiment_counts.entry(s.to_string()).or_insert(0) += 1;
            }
        }
        if acc.phrase.is_none() {
            if let Some(phrases) = &phrases {
                let p = phrases[row].trim();
                if !p.is_empty() {
                    acc.phrase = Some(p.to_string());
                }
            }
        }
    }

    let mut summaries: Vec<PlaceSummary> = by_place
        .into_iter()
        .map(|(lugar, acc)| {
            let calificacion_promedio = if acc.rating_count > 0 {
                Some(round2(acc.rating_sum / acc.rating_count as f64))
            } else {
                None
            };
            // Ties resolve as Positivo over Neutro over Negativo; max_by
            // keeps the last maximum, so iterate in reverse preference.
            let sentimiento_dominante = [SENTIMENT_NEGATIVE, SENTIMENT_NEUTRAL, SENTIMENT_POSITIVE]
                .iter()
                .filter_map(|s| acc.sentiment_counts.get(*s).map(|c| (*s, *c)))
                .max_by(|a, b| a.1.cmp(&b.1))
                .map(|(s, _)| s.to_string());
            PlaceSummary {
                lugar,
                total: acc.total,
                calificacion_promedio,
                sentimiento_dominante,
                frase_destacada: acc.phrase,
            }
        })
        .collect();
    summaries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.lugar.cmp(&b.lugar)));
    summaries
}

fn kpis(dataset: &Dataset, stats: &DatasetStats) -> Kpis {
    let total = dataset.row_count();
    let (positivas, negativas) = stats
        .sentimiento
        .as_ref()
        .map(|s| {
            (
                *s.conteo.get(SENTIMENT_POSITIVE).unwrap_or(&0),
                *s.conteo.get(SENTIMENT_NEGATIVE).unwrap_or(&0),
            )
        })
        .unwrap_or((0, 0));
    let lugares_distintos = dataset
        .column(COL_PLACE)
        .map(|places| {
            places
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect::<std::collections::HashSet<_>>()
                .len()
        })
        .unwrap_or(0);
    Kpis {
        total_reviews: total,
        porcentaje_positivas: percentage(positivas, total),
        porcentaje_negativas: percentage(negativas, total),
        calificacion_promedio: stats.calificacion.as_ref().and_then(|r| r.promedio),
        lugares_distintos,
    }
}
