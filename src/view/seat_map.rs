//! Карта мест: классификация ячеек, обработка клика и масштаб/сдвиг.
//!
//! Трансформация (масштаб, сдвиг) влияет только на отрисовку и никак не
//! участвует в логике выбора.

use std::collections::HashMap;

use crate::geometry::{self, Cell, GridCell, GRID_COLS, GRID_ROWS};
use crate::models::{SeatCode, SeatRecord, SeatStatus};
use crate::stores::{PreReservedCache, SelectionStore};

/// Как место выглядит для текущего пользователя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatDisplay {
    Selected,
    Available,
    OccupiedByOther,
    PreReservedBySelf,
}

impl SeatDisplay {
    /// Выбранное место кликабельно: чужим занятым оно быть не может,
    /// такие классифицируются раньше.
    pub fn is_clickable(self) -> bool {
        !matches!(self, SeatDisplay::OccupiedByOther)
    }

    pub fn css_class(self) -> &'static str {
        match self {
            SeatDisplay::Selected => "seat seat-selected",
            SeatDisplay::Available => "seat seat-available",
            SeatDisplay::OccupiedByOther => "seat seat-occupied",
            SeatDisplay::PreReservedBySelf => "seat seat-mine",
        }
    }
}

/// Классификация места. Занятость другими важнее выбора.
pub fn classify(
    record: Option<&SeatRecord>,
    is_selected: bool,
    is_pre_reserved_by_self: bool,
) -> SeatDisplay {
    let status = record.map(|r| r.status).unwrap_or(SeatStatus::Available);
    let taken_by_other = match status {
        SeatStatus::Available => false,
        SeatStatus::PreReserved => !is_pre_reserved_by_self,
        SeatStatus::Reserved | SeatStatus::Occupied | SeatStatus::Unknown => true,
    };

    if taken_by_other {
        SeatDisplay::OccupiedByOther
    } else if is_selected {
        SeatDisplay::Selected
    } else if is_pre_reserved_by_self {
        SeatDisplay::PreReservedBySelf
    } else {
        SeatDisplay::Available
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellView {
    Seat { code: SeatCode, display: SeatDisplay, status: SeatStatus },
    Aisle,
    Stage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Toggled { code: SeatCode, selected: bool },
    /// Место нельзя выбрать в текущем состоянии.
    Rejected { code: SeatCode, display: SeatDisplay },
    /// Кода нет в зале или в последнем снимке API.
    UnknownSeat,
}

/// Масштаб и сдвиг карты.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl ViewTransform {
    pub const MIN_SCALE: f32 = 0.5;
    pub const MAX_SCALE: f32 = 3.0;
    pub const ZOOM_STEP: f32 = 0.25;
    pub const PAN_STEP: f32 = 80.0;

    pub fn zoom_in(&mut self) {
        self.scale = (self.scale + Self::ZOOM_STEP).min(Self::MAX_SCALE);
    }

    pub fn zoom_out(&mut self) {
        self.scale = (self.scale - Self::ZOOM_STEP).max(Self::MIN_SCALE);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn css(&self) -> String {
        format!(
            "transform: translate({:.0}px, {:.0}px) scale({:.2}); transform-origin: top center;",
            self.offset_x, self.offset_y, self.scale
        )
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { scale: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }
}

/// Снимок мест из API, по которому строится карта.
#[derive(Debug, Clone, Default)]
pub struct SeatMapView {
    records: HashMap<SeatCode, SeatRecord>,
}

impl SeatMapView {
    pub fn new(records: Vec<SeatRecord>) -> Self {
        Self { records: records.into_iter().map(|r| (r.code.clone(), r)).collect() }
    }

    pub fn record(&self, code: &SeatCode) -> Option<&SeatRecord> {
        self.records.get(code)
    }

    pub fn display_of(&self, code: &SeatCode, selection: &SelectionStore, pre_reserved: &PreReservedCache) -> SeatDisplay {
        classify(self.record(code), selection.contains(code), pre_reserved.is_pre_reserved(code))
    }

    pub fn cell(&self, cell: GridCell, selection: &SelectionStore, pre_reserved: &PreReservedCache) -> CellView {
        match geometry::resolve_cell(cell) {
            Cell::Seat(code) => {
                let status = self.record(&code).map(|r| r.status).unwrap_or(SeatStatus::Available);
                let display = self.display_of(&code, selection, pre_reserved);
                CellView::Seat { code, display, status }
            }
            Cell::Stage => CellView::Stage,
            Cell::Aisle | Cell::OutsideGrid => CellView::Aisle,
        }
    }

    /// Вся сетка 19×40 построчно.
    pub fn grid(&self, selection: &SelectionStore, pre_reserved: &PreReservedCache) -> Vec<Vec<CellView>> {
        (0..GRID_ROWS)
            .map(|row| {
                (0..GRID_COLS)
                    .map(|col| self.cell(GridCell::new(row, col), selection, pre_reserved))
                    .collect()
            })
            .collect()
    }

    /// Клик по месту: переключает выбор только для доступных мест.
    pub fn click(&self, code: &SeatCode, selection: &mut SelectionStore, pre_reserved: &PreReservedCache) -> ClickOutcome {
        if geometry::locate(code).is_none() || self.record(code).is_none() {
            return ClickOutcome::UnknownSeat;
        }
        let display = self.display_of(code, selection, pre_reserved);
        if !display.is_clickable() {
            return ClickOutcome::Rejected { code: code.clone(), display };
        }
        let selected = selection.toggle(code);
        ClickOutcome::Toggled { code: code.clone(), selected }
    }

    /// Выбранные места, которые по свежему снимку уже заняты другими.
    pub fn conflicting_selection(&self, selection: &SelectionStore, pre_reserved: &PreReservedCache) -> Vec<SeatCode> {
        selection
            .seats()
            .iter()
            .filter(|code| self.display_of(code, selection, pre_reserved) == SeatDisplay::OccupiedByOther)
            .cloned()
            .collect()
    }
}
