//! Screen abstraction: one record set, one filter, one stats function.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::export::CsvRow;
use crate::generator::MockRng;

use super::criteria::{filter_records, RecordFilter};
use super::paginate::{paginate, Page, PageRequest};

/// A record-table screen.
pub trait Screen {
    type Record: Clone + Serialize + DeserializeOwned + CsvRow + Send + 'static;
    type Filter: RecordFilter<Self::Record> + Default + Clone + Serialize + DeserializeOwned + Send;
    type Stats: Serialize;
    /// Secondary tables and charts derived from the full record set.
    type Insights: Serialize;

    /// Route segment, also the export file stem.
    const NAME: &'static str;
    /// Persistence key of the whole record array.
    const STORAGE_KEY: &'static str;
    /// Bumped whenever the stored record shape changes.
    const RECORD_VERSION: u32;
    /// Noun used in create / update / delete notices.
    const LABEL: &'static str = "Record";

    /// Fabricate the initial record set.
    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<Self::Record>;

    /// Summary cards. Screens choose whether they summarise `all` or `filtered`.
    /// Date-relative counts are taken against `today`.
    fn stats(all: &[Self::Record], filtered: &[Self::Record], today: NaiveDate) -> Self::Stats;

    fn insights(records: &[Self::Record], rng: &mut MockRng, today: NaiveDate) -> Self::Insights;

    fn export_stem(_today: NaiveDate) -> String {
        Self::NAME.to_string()
    }
}

/// Live state of one screen.
pub struct ScreenState<S: Screen> {
    records: Vec<S::Record>,
    filter: S::Filter,
    filtered: Vec<S::Record>,
    page: PageRequest,
}

impl<S: Screen> ScreenState<S> {
    pub fn new(records: Vec<S::Record>) -> Self {
        let filter = S::Filter::default();
        let filtered = records.clone();
        Self {
            records,
            filter,
            filtered,
            page: PageRequest::default(),
        }
    }

    pub fn records(&self) -> &[S::Record] {
        &self.records
    }

    pub fn filtered(&self) -> &[S::Record] {
        &self.filtered
    }

    pub fn filter(&self) -> &S::Filter {
        &self.filter
    }

    pub fn page_request(&self) -> PageRequest {
        self.page
    }

    /// Replace the filter, re-run it and return to the first page.
    pub fn set_filter(&mut self, filter: S::Filter) {
        self.filter = filter;
        self.refilter();
        self.page = self.page.first();
    }

    pub fn reset_filters(&mut self) {
        self.set_filter(S::Filter::default());
    }

    /// Change the page window only.
    pub fn set_page(&mut self, page: PageRequest) {
        self.page = page;
    }

    /// Swap in a new record set, keeping the current filter.
    pub fn replace_records(&mut self, records: Vec<S::Record>) {
        self.records = records;
        self.refilter();
    }

    pub fn page(&self) -> Page<S::Record> {
        paginate(&self.filtered, &self.page)
    }

    pub fn stats(&self, today: NaiveDate) -> S::Stats {
        S::stats(&self.records, &self.filtered, today)
    }

    fn refilter(&mut self) {
        self.filtered = filter_records(&self.records, &self.filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dose {
        vaccine: String,
        count: u32,
    }

    impl CsvRow for Dose {
        const HEADERS: &'static [&'static str] = &["Vaccine", "Count"];
        fn csv_fields(&self) -> Vec<String> {
            vec![self.vaccine.clone(), self.count.to_string()]
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct DoseFilter {
        min: Option<u32>,
    }

    impl RecordFilter<Dose> for DoseFilter {
        fn matches(&self, record: &Dose) -> bool {
            self.min.map_or(true, |m| record.count >= m)
        }
    }

    struct Doses;

    impl Screen for Doses {
        type Record = Dose;
        type Filter = DoseFilter;
        type Stats = usize;
        type Insights = ();
        const NAME: &'static str = "doses";
        const STORAGE_KEY: &'static str = "doses";
        const RECORD_VERSION: u32 = 1;

        fn generate(rng: &mut MockRng, _today: NaiveDate) -> Vec<Dose> {
            (0..25)
                .map(|i| Dose {
                    vaccine: format!("V{i}"),
                    count: rng.int(0..100),
                })
                .collect()
        }

        fn stats(_all: &[Dose], filtered: &[Dose], _today: NaiveDate) -> usize {
            filtered.len()
        }

        fn insights(_records: &[Dose], _rng: &mut MockRng, _today: NaiveDate) {}
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn state() -> ScreenState<Doses> {
        ScreenState::new(Doses::generate(&mut MockRng::seeded(5), today()))
    }

    #[test]
    fn set_filter_resets_page_index() {
        let mut s = state();
        s.set_page(PageRequest::new(2, 10));
        s.set_filter(DoseFilter { min: Some(10) });
        assert_eq!(s.page_request().page_index, 0);
        assert_eq!(s.page_request().page_size, 10);
    }

    #[test]
    fn reset_restores_full_set() {
        let mut s = state();
        s.set_filter(DoseFilter { min: Some(50) });
        assert!(s.filtered().len() <= s.records().len());
        s.reset_filters();
        assert_eq!(s.filtered(), s.records());
        assert_eq!(s.stats(today()), 25);
    }

    #[test]
    fn set_page_only_moves_window() {
        let mut s = state();
        s.set_filter(DoseFilter { min: Some(0) });
        let before = s.filtered().to_vec();
        s.set_page(PageRequest::new(1, 10));
        assert_eq!(s.filtered(), before.as_slice());
        assert_eq!(s.page().items, before[10..20].to_vec());
    }

    #[test]
    fn impossible_filter_gives_empty_page() {
        let mut s = state();
        s.set_filter(DoseFilter { min: Some(1000) });
        assert!(s.page().items.is_empty());
        assert_eq!(s.stats(today()), 0);
    }
}
