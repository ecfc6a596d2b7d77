use crate::db::RecordStore;
use crate::parking::{self, ParkingReport};
use crate::plate::format_plate;
use crate::recognition::{Detector, TextRecognizer};
use crate::types::AddOutcome;
use image::{DynamicImage, RgbaImage};
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Submission {
    pub plate: String,
    pub database_message: String,
    pub outcome: Option<AddOutcome>,
    pub annotated: RgbaImage,
    pub report: ParkingReport,
}

/// Runs the recognizers over a submission and keeps the plate list.
///
/// All store access goes through one lock, so two requests can't both append
/// the same new plate.
pub struct Processor {
    recognizer: Arc<dyn TextRecognizer>,
    detector: Arc<dyn Detector>,
    store: Mutex<RecordStore>,
}

impl Processor {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        detector: Arc<dyn Detector>,
        store: RecordStore,
    ) -> Self {
        Processor {
            recognizer,
            detector,
            store: Mutex::new(store),
        }
    }

    pub async fn recognize_plate(&self, image: &DynamicImage) -> Result<String, failure::Error> {
        let raw = self.recognizer.read(image).await?;
        let plate = format_plate(&raw);
        info!("Recognized {:?} as plate {:?}", raw, plate);
        Ok(plate)
    }

    pub async fn analyze_parking(
        &self,
        image: &DynamicImage,
    ) -> Result<(RgbaImage, ParkingReport), failure::Error> {
        let boxes = self.detector.detect(image).await?;
        let report = ParkingReport::from_boxes(&boxes);
        info!(
            "Parking lot has {} free and {} occupied slots",
            report.free, report.occupied
        );
        Ok((parking::annotate(image, &boxes), report))
    }

    pub async fn add_plate(&self, plate: &str) -> Result<AddOutcome, failure::Error> {
        let store = self.store.lock().await;
        Ok(store.add(plate)?)
    }

    pub async fn list_plates(&self) -> Result<Vec<String>, failure::Error> {
        let store = self.store.lock().await;
        Ok(store.load()?)
    }

    pub async fn process(
        &self,
        license: &DynamicImage,
        parking: &DynamicImage,
        add_to_db: bool,
    ) -> Result<Submission, failure::Error> {
        let plate = self.recognize_plate(license).await?;
        let outcome = if add_to_db {
            Some(self.add_plate(&plate).await?)
        } else {
            None
        };
        let database_message = match &outcome {
            Some(outcome) => outcome.message.clone(),
            None => format!("Plate {} was not added to the database.", plate),
        };
        let (annotated, report) = self.analyze_parking(parking).await?;
        Ok(Submission {
            plate,
            database_message,
            outcome,
            annotated,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::fakes::{slot, Failing, FixedBoxes, FixedText};
    use crate::types::AddStatus;
    use tempfile::tempdir;

    fn processor(text: &str, store: RecordStore) -> Processor {
        Processor::new(
            Arc::new(FixedText(text.to_string())),
            Arc::new(FixedBoxes(vec![
                slot(0, 0.0, 0.0, 3.0, 3.0),
                slot(1, 4.0, 4.0, 7.0, 7.0),
                slot(1, 1.0, 5.0, 3.0, 7.0),
            ])),
            store,
        )
    }

    #[tokio::test]
    async fn recognized_text_is_formatted() {
        let dir = tempdir().unwrap();
        let p = processor("a 123bc45rus", RecordStore::new(dir.path().join("db.txt")));
        let plate = p.recognize_plate(&DynamicImage::new_rgb8(4, 4)).await.unwrap();
        assert_eq!(plate, "A 123 BC 5 RUS");
    }

    #[tokio::test]
    async fn submission_without_add_leaves_store_untouched() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.txt"));
        let p = processor("A12345RUS", store.clone());
        let image = DynamicImage::new_rgb8(8, 8);

        let submission = p.process(&image, &image, false).await.unwrap();
        assert_eq!(submission.plate, "A 123 45 RUS");
        assert_eq!(submission.outcome, None);
        assert_eq!(
            submission.database_message,
            "Plate A 123 45 RUS was not added to the database."
        );
        assert_eq!(submission.report.free, 2);
        assert_eq!(submission.report.occupied, 1);
        assert_eq!(submission.annotated.dimensions(), (8, 8));
        assert!(store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_submission_reports_duplicate() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.txt"));
        let p = processor("A12345RUS", store.clone());
        let image = DynamicImage::new_rgb8(8, 8);

        let first = p.process(&image, &image, true).await.unwrap();
        assert_eq!(first.outcome.unwrap().status, AddStatus::Added);
        let second = p.process(&image, &image, true).await.unwrap();
        assert_eq!(second.outcome.unwrap().status, AddStatus::AlreadyExists);
        assert!(second.database_message.contains("already exists"));

        assert_eq!(p.list_plates().await.unwrap(), vec!["A 123 45 RUS"]);
    }

    #[tokio::test]
    async fn concurrent_adds_of_the_same_plate_store_it_once() {
        let dir = tempdir().unwrap();
        let p = Arc::new(processor("X123", RecordStore::new(dir.path().join("db.txt"))));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let p = p.clone();
                tokio::spawn(async move { p.add_plate("X123").await.unwrap() })
            })
            .collect();
        let mut added = 0;
        for task in tasks {
            if task.await.unwrap().status == AddStatus::Added {
                added += 1;
            }
        }
        assert_eq!(added, 1);
        assert_eq!(p.list_plates().await.unwrap(), vec!["X123"]);
    }

    #[tokio::test]
    async fn detector_failure_is_propagated() {
        let dir = tempdir().unwrap();
        let p = Processor::new(
            Arc::new(FixedText("A12345".to_string())),
            Arc::new(Failing),
            RecordStore::new(dir.path().join("db.txt")),
        );
        let image = DynamicImage::new_rgb8(2, 2);
        let err = p.process(&image, &image, false).await.err().unwrap();
        assert!(err.to_string().contains("detector offline"));
    }

    #[tokio::test]
    async fn store_failure_is_propagated() {
        let dir = tempdir().unwrap();
        let p = processor("A12345", RecordStore::new(dir.path()));
        let image = DynamicImage::new_rgb8(2, 2);
        assert!(p.process(&image, &image, true).await.is_err());
    }
}
