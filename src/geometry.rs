//! geometry.rs
//!
//! Геометрия зала: отображение ячейки фиксированной сетки 19×40 в код места.
//!
//! Сетка описывает один конкретный зал. Строка 8 сетки - поперечный проход,
//! колонки 8, 9, 30, 31 - продольные проходы, в двух последних рядах по центру
//! вырезан блок сцены. Номера мест внутри ряда идут подряд, пропуская проходы
//! и сцену, поэтому номер считается как `col + 1` минус число пропущенных
//! ячеек левее.
//!
//! Функция чистая и тотальная: одинаковый вход всегда даёт одинаковый выход,
//! координаты вне сетки возвращают `Cell::OutsideGrid`, паники нет.

use crate::models::SeatCode;

pub const GRID_ROWS: usize = 19;
pub const GRID_COLS: usize = 40;

/// Строка сетки, целиком занятая поперечным проходом.
pub const AISLE_ROW: usize = 8;

/// Колонки продольных проходов, пустые в каждом ряду.
pub const AISLE_COLUMNS: [usize; 4] = [8, 9, 30, 31];

pub const ROW_LETTERS: [char; 18] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
];

/// Вырез сцены в одном ряду: занятые колонки и параметры пропуска номеров.
struct StageCut {
    seat_row: usize,
    first_col: usize,
    last_col: usize,
    // Пропуск начинается после этой колонки и не превышает ширину выреза
    skip_after: usize,
    skip_cap: usize,
}

const STAGE_CUTS: [StageCut; 2] = [
    StageCut { seat_row: 16, first_col: 17, last_col: 22, skip_after: 16, skip_cap: 6 },
    StageCut { seat_row: 17, first_col: 15, last_col: 24, skip_after: 14, skip_cap: 10 },
];

/// Индекс ячейки в сетке раскладки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl GridCell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Seat(SeatCode),
    Aisle,
    Stage,
    OutsideGrid,
}

impl Cell {
    pub fn is_seat(&self) -> bool {
        matches!(self, Cell::Seat(_))
    }

    pub fn seat_code(&self) -> Option<&SeatCode> {
        match self {
            Cell::Seat(code) => Some(code),
            _ => None,
        }
    }

    pub fn into_seat_code(self) -> Option<SeatCode> {
        match self {
            Cell::Seat(code) => Some(code),
            _ => None,
        }
    }
}

/// Логический ряд мест для строки сетки; `None` для прохода и строк вне сетки.
pub fn seat_row(row: usize) -> Option<usize> {
    match row {
        AISLE_ROW => None,
        r if r < AISLE_ROW => Some(r),
        r if r < GRID_ROWS => Some(r - 1),
        _ => None,
    }
}

pub fn resolve(row: usize, col: usize) -> Cell {
    if row >= GRID_ROWS || col >= GRID_COLS {
        return Cell::OutsideGrid;
    }
    let Some(seat_row) = seat_row(row) else {
        return Cell::Aisle;
    };

    let cut = STAGE_CUTS.iter().find(|cut| cut.seat_row == seat_row);
    if let Some(cut) = cut {
        if (cut.first_col..=cut.last_col).contains(&col) {
            return Cell::Stage;
        }
    }

    if AISLE_COLUMNS.contains(&col) {
        return Cell::Aisle;
    }

    let mut skipped = AISLE_COLUMNS.iter().filter(|&&c| c < col).count();
    if let Some(cut) = cut {
        if col > cut.skip_after {
            skipped += (col - cut.skip_after).min(cut.skip_cap);
        }
    }

    let number = (col + 1 - skipped) as u32;
    Cell::Seat(SeatCode::new(ROW_LETTERS[seat_row], number))
}

pub fn resolve_cell(cell: GridCell) -> Cell {
    resolve(cell.row, cell.col)
}

/// Все места зала в порядке обхода сетки (по строкам, слева направо).
pub fn all_seats() -> impl Iterator<Item = (GridCell, SeatCode)> {
    (0..GRID_ROWS).flat_map(|row| {
        (0..GRID_COLS).filter_map(move |col| {
            resolve(row, col)
                .into_seat_code()
                .map(|code| (GridCell::new(row, col), code))
        })
    })
}

/// Обратный поиск: ячейка сетки, в которой стоит место с данным кодом.
pub fn locate(code: &SeatCode) -> Option<GridCell> {
    let row_idx = ROW_LETTERS.iter().position(|&l| l == code.row_letter())?;
    let grid_row = if row_idx < AISLE_ROW { row_idx } else { row_idx + 1 };
    (0..GRID_COLS)
        .map(|col| GridCell::new(grid_row, col))
        .find(|cell| resolve_cell(*cell).seat_code() == Some(code))
}
