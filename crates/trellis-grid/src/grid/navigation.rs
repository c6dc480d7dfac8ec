//! Keyboard navigation coordinate mapper.
//!
//! A headless state machine that turns key events into focus movements over
//! the grid's logical coordinate space. It knows nothing about widgets or
//! geometry; the host implements [`NavigationGrid`] to describe the current
//! shape of the grid (row counts, expandability, open details, per-row
//! column sets) and applies the returned [`NavigationOutcome`].
//!
//! Coordinates are logical: body rows address by flat index, header and
//! footer rows by plain child index, columns by their stable order value. A
//! row with open details contributes one extra vertical stop (the details
//! pseudo-row) directly below it.

/// Keyboard modifier state accompanying a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardModifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

/// The keys navigation reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Home,
    End,
    Enter,
    Escape,
    F2,
    Tab,
}

/// One key press as the host observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: KeyboardModifiers,
    /// Whether the event originated on a text input descendant. Enter on a
    /// text input must not toggle interaction mode.
    pub on_text_input: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: KeyboardModifiers::default(),
            on_text_input: false,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: KeyboardModifiers) -> Self {
        Self {
            key,
            modifiers,
            on_text_input: false,
        }
    }
}

/// The three vertical sections of the grid. Vertical movement never crosses
/// sections; Tab does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSection {
    Header,
    Body,
    Footer,
}

/// A vertical stop: a row index plus the details flag selecting the pseudo
/// row below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPosition {
    /// Flat index in the body, child index in header/footer.
    pub index: usize,
    /// Whether this stop is the row's open details area.
    pub details: bool,
}

impl RowPosition {
    pub fn row(index: usize) -> Self {
        Self {
            index,
            details: false,
        }
    }

    pub fn details(index: usize) -> Self {
        Self {
            index,
            details: true,
        }
    }
}

/// Whether focus rests on whole rows or individual cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Row,
    Cell,
}

/// A focus position in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTarget {
    pub section: GridSection,
    pub row: RowPosition,
    /// The focused column's order value; `None` in row-focus mode and on
    /// details pseudo-rows.
    pub column_order: Option<i64>,
}

/// Tab stops walked by Tab/Shift+Tab, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TabAnchor {
    Table,
    Header,
    Body,
    Footer,
    FocusExit,
}

const TAB_ANCHORS: [TabAnchor; 5] = [
    TabAnchor::Table,
    TabAnchor::Header,
    TabAnchor::Body,
    TabAnchor::Footer,
    TabAnchor::FocusExit,
];

/// Keys still handled while interaction mode is active.
const INTERACTION_KEYS: [Key; 4] = [Key::Enter, Key::Escape, Key::F2, Key::Tab];

/// What a key event amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Focus moves (or stays, for a boundary repeat) at this target.
    Moved(FocusTarget),
    /// The row at this flat index should expand; focus does not move.
    Expanded(usize),
    /// The row at this flat index should collapse; focus does not move.
    Collapsed(usize),
    /// Interaction mode begins at this target.
    EnterInteraction(FocusTarget),
    /// Interaction mode ends, focus restored to this target.
    LeaveInteraction(FocusTarget),
    /// The event is not ours; let native focus handling proceed.
    PassThrough,
    /// Nothing to do.
    Ignored,
}

/// The host-side view navigation consumes.
pub trait NavigationGrid {
    /// Total visible body rows.
    fn flat_size(&self) -> usize;
    fn header_row_count(&self) -> usize;
    fn footer_row_count(&self) -> usize;
    fn is_header_row_hidden(&self, index: usize) -> bool;
    fn is_footer_row_hidden(&self, index: usize) -> bool;
    /// Whether the body row at this flat index can expand (has children).
    fn is_expandable(&self, flat_index: usize) -> bool;
    fn is_expanded(&self, flat_index: usize) -> bool;
    fn has_open_details(&self, flat_index: usize) -> bool;
    /// Visible column order values of this row, in visual order. Details
    /// pseudo-rows report an empty set.
    fn row_column_orders(&self, section: GridSection, row: RowPosition) -> Vec<i64>;
    /// Body rows a PageUp/PageDown jump covers.
    fn rows_per_page(&self) -> usize;
    /// Right-to-left layout swaps the meaning of horizontal keys.
    fn rtl(&self) -> bool;
    fn body_empty(&self) -> bool;
}

/// The navigation state machine.
pub struct KeyboardNavigator {
    focus: Option<FocusTarget>,
    mode: FocusMode,
    interacting: bool,
    /// The column the user last chose explicitly. Restored when vertical
    /// movement drifts across rows whose column sets lack it.
    memo_column_order: Option<i64>,
    anchor: TabAnchor,
}

impl Default for KeyboardNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardNavigator {
    pub fn new() -> Self {
        Self {
            focus: None,
            mode: FocusMode::Row,
            interacting: false,
            memo_column_order: None,
            anchor: TabAnchor::Table,
        }
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.focus
    }

    /// Set the focus position externally (pointer click, programmatic focus).
    pub fn set_focus(&mut self, target: FocusTarget) {
        self.focus = Some(target);
        self.mode = if target.column_order.is_some() || target.row.details {
            FocusMode::Cell
        } else {
            FocusMode::Row
        };
        self.memo_column_order = None;
        self.anchor = match target.section {
            GridSection::Header => TabAnchor::Header,
            GridSection::Body => TabAnchor::Body,
            GridSection::Footer => TabAnchor::Footer,
        };
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
        self.interacting = false;
        self.memo_column_order = None;
    }

    pub fn mode(&self) -> FocusMode {
        self.mode
    }

    pub fn is_interacting(&self) -> bool {
        self.interacting
    }

    /// Map one key event to a navigation outcome and update internal state
    /// accordingly.
    pub fn handle_key(&mut self, grid: &dyn NavigationGrid, event: &KeyEvent) -> NavigationOutcome {
        if self.interacting && !INTERACTION_KEYS.contains(&event.key) {
            return NavigationOutcome::Ignored;
        }
        if self.interacting {
            return self.handle_interaction_key(event);
        }

        match event.key {
            Key::ArrowUp => self.move_vertical(grid, -1),
            Key::ArrowDown => self.move_vertical(grid, 1),
            Key::PageUp => self.move_vertical(grid, -(grid.rows_per_page() as isize)),
            Key::PageDown => self.move_vertical(grid, grid.rows_per_page() as isize),
            Key::ArrowLeft | Key::ArrowRight => {
                // RTL swaps which key means "forward into the row".
                let forward = (event.key == Key::ArrowRight) != grid.rtl();
                self.move_horizontal(grid, forward)
            }
            Key::Home => self.move_home_end(grid, event.modifiers.control, false),
            Key::End => self.move_home_end(grid, event.modifiers.control, true),
            Key::Enter if !event.on_text_input => self.enter_interaction(),
            Key::F2 => self.enter_interaction(),
            Key::Tab => self.handle_tab(grid, event.modifiers.shift),
            _ => NavigationOutcome::Ignored,
        }
    }

    fn handle_interaction_key(&mut self, event: &KeyEvent) -> NavigationOutcome {
        let leave = match event.key {
            Key::Escape | Key::F2 => true,
            Key::Enter => !event.on_text_input,
            Key::Tab => return NavigationOutcome::PassThrough,
            _ => false,
        };
        if leave {
            self.interacting = false;
            match self.focus {
                Some(target) => NavigationOutcome::LeaveInteraction(target),
                None => NavigationOutcome::Ignored,
            }
        } else {
            NavigationOutcome::Ignored
        }
    }

    fn enter_interaction(&mut self) -> NavigationOutcome {
        if self.mode != FocusMode::Cell {
            return NavigationOutcome::Ignored;
        }
        match self.focus {
            Some(target) => {
                self.interacting = true;
                NavigationOutcome::EnterInteraction(target)
            }
            None => NavigationOutcome::Ignored,
        }
    }

    fn move_vertical(&mut self, grid: &dyn NavigationGrid, dy: isize) -> NavigationOutcome {
        let Some(current) = self.focus else {
            return NavigationOutcome::Ignored;
        };
        let row = match current.section {
            GridSection::Body => {
                if grid.body_empty() {
                    return NavigationOutcome::Ignored;
                }
                self.step_body(grid, current.row, dy)
            }
            GridSection::Header => match Self::step_group(
                current.row.index,
                grid.header_row_count(),
                dy,
                |index| grid.is_header_row_hidden(index),
            ) {
                Some(index) => RowPosition::row(index),
                None => current.row,
            },
            GridSection::Footer => match Self::step_group(
                current.row.index,
                grid.footer_row_count(),
                dy,
                |index| grid.is_footer_row_hidden(index),
            ) {
                Some(index) => RowPosition::row(index),
                None => current.row,
            },
        };

        let column_order = self.restore_column(grid, current, row);
        let target = FocusTarget {
            section: current.section,
            row,
            column_order,
        };
        self.focus = Some(target);
        NavigationOutcome::Moved(target)
    }

    /// One vertical step through the body's stop sequence, where a row with
    /// open details contributes a second stop. Multi-row jumps (PageUp/Down)
    /// land directly on the clamped row.
    fn step_body(&self, grid: &dyn NavigationGrid, from: RowPosition, dy: isize) -> RowPosition {
        let last = grid.flat_size() - 1;
        if dy.unsigned_abs() > 1 {
            let index = from.index.saturating_add_signed(dy).min(last);
            return RowPosition::row(index);
        }
        if dy > 0 {
            if !from.details && grid.has_open_details(from.index) {
                RowPosition::details(from.index)
            } else if from.index == last {
                from
            } else {
                RowPosition::row(from.index + 1)
            }
        } else if from.details {
            RowPosition::row(from.index)
        } else if from.index == 0 {
            from
        } else if grid.has_open_details(from.index - 1) {
            RowPosition::details(from.index - 1)
        } else {
            RowPosition::row(from.index - 1)
        }
    }

    /// One vertical step inside the header or footer, skipping hidden rows
    /// in the direction of travel. Returns `None` when no visible row exists
    /// that way.
    fn step_group(
        from: usize,
        count: usize,
        dy: isize,
        hidden: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        let step = if dy > 0 { 1isize } else { -1 };
        let mut index = from as isize;
        loop {
            index += step;
            if index < 0 || index >= count as isize {
                return None;
            }
            if !hidden(index as usize) {
                return Some(index as usize);
            }
        }
    }

    /// Column for a freshly reached row: in cell mode, keep the intended
    /// column where the new row has it, otherwise drift to the nearest
    /// visible one and remember the intent.
    fn restore_column(
        &mut self,
        grid: &dyn NavigationGrid,
        current: FocusTarget,
        row: RowPosition,
    ) -> Option<i64> {
        if self.mode != FocusMode::Cell {
            return None;
        }
        let orders = grid.row_column_orders(current.section, row);
        if orders.is_empty() {
            return None;
        }
        let desired = self.memo_column_order.or(current.column_order);
        let Some(desired) = desired else {
            return orders.first().copied();
        };
        if orders.contains(&desired) {
            self.memo_column_order = None;
            return Some(desired);
        }
        let nearest = orders
            .iter()
            .copied()
            .min_by_key(|order| order.abs_diff(desired));
        self.memo_column_order = Some(desired);
        nearest
    }

    fn move_horizontal(&mut self, grid: &dyn NavigationGrid, forward: bool) -> NavigationOutcome {
        let Some(current) = self.focus else {
            return NavigationOutcome::Ignored;
        };

        if self.mode == FocusMode::Row {
            return self.row_mode_horizontal(grid, current, forward);
        }

        // A details pseudo-row has a single cell; backward returns to row
        // focus on the owning row.
        if current.row.details {
            if forward {
                return NavigationOutcome::Moved(current);
            }
            return self.to_row_focus(current);
        }

        let orders = grid.row_column_orders(current.section, current.row);
        if orders.is_empty() {
            return NavigationOutcome::Ignored;
        }
        let position = current
            .column_order
            .and_then(|order| orders.iter().position(|&o| o == order));
        let Some(position) = position else {
            // The focused column disappeared under us; snap to the first.
            return self.move_to_column(current, orders[0]);
        };

        if forward {
            match orders.get(position + 1) {
                Some(&next) => self.move_to_column(current, next),
                None => NavigationOutcome::Moved(current),
            }
        } else if position == 0 {
            // Backward off the first cell returns to row focus in the body.
            if current.section == GridSection::Body {
                self.to_row_focus(current)
            } else {
                NavigationOutcome::Moved(current)
            }
        } else {
            self.move_to_column(current, orders[position - 1])
        }
    }

    fn row_mode_horizontal(
        &mut self,
        grid: &dyn NavigationGrid,
        current: FocusTarget,
        forward: bool,
    ) -> NavigationOutcome {
        if current.section != GridSection::Body {
            return NavigationOutcome::Ignored;
        }
        let index = current.row.index;
        if forward {
            if grid.is_expandable(index) && !grid.is_expanded(index) {
                return NavigationOutcome::Expanded(index);
            }
            // Enter the row: focus its first visible cell.
            let orders = grid.row_column_orders(current.section, current.row);
            let Some(&first) = orders.first() else {
                return NavigationOutcome::Ignored;
            };
            self.mode = FocusMode::Cell;
            self.move_to_column(current, first)
        } else {
            if grid.is_expandable(index) && grid.is_expanded(index) {
                return NavigationOutcome::Collapsed(index);
            }
            NavigationOutcome::Ignored
        }
    }

    fn move_to_column(&mut self, current: FocusTarget, order: i64) -> NavigationOutcome {
        self.memo_column_order = None;
        let target = FocusTarget {
            column_order: Some(order),
            ..current
        };
        self.focus = Some(target);
        NavigationOutcome::Moved(target)
    }

    fn to_row_focus(&mut self, current: FocusTarget) -> NavigationOutcome {
        self.mode = FocusMode::Row;
        self.memo_column_order = None;
        let target = FocusTarget {
            section: current.section,
            row: RowPosition::row(current.row.index),
            column_order: None,
        };
        self.focus = Some(target);
        NavigationOutcome::Moved(target)
    }

    fn move_home_end(
        &mut self,
        grid: &dyn NavigationGrid,
        control: bool,
        end: bool,
    ) -> NavigationOutcome {
        let Some(current) = self.focus else {
            return NavigationOutcome::Ignored;
        };

        if control {
            if current.section != GridSection::Body || grid.flat_size() == 0 {
                return NavigationOutcome::Ignored;
            }
            let index = if end { grid.flat_size() - 1 } else { 0 };
            let row = RowPosition::row(index);
            let column_order = self.restore_column(grid, current, row);
            let target = FocusTarget {
                section: current.section,
                row,
                column_order,
            };
            self.focus = Some(target);
            return NavigationOutcome::Moved(target);
        }

        if self.mode != FocusMode::Cell || current.row.details {
            return NavigationOutcome::Ignored;
        }
        let orders = grid.row_column_orders(current.section, current.row);
        let picked = if end {
            orders.last().copied()
        } else {
            orders.first().copied()
        };
        match picked {
            Some(order) => self.move_to_column(current, order),
            None => NavigationOutcome::Ignored,
        }
    }

    fn handle_tab(&mut self, grid: &dyn NavigationGrid, backward: bool) -> NavigationOutcome {
        let header_visible = (0..grid.header_row_count()).any(|i| !grid.is_header_row_hidden(i));
        let footer_visible = (0..grid.footer_row_count()).any(|i| !grid.is_footer_row_hidden(i));
        let present = |anchor: TabAnchor| match anchor {
            TabAnchor::Table | TabAnchor::FocusExit | TabAnchor::Body => true,
            TabAnchor::Header => header_visible,
            TabAnchor::Footer => footer_visible,
        };

        let from = TAB_ANCHORS
            .iter()
            .position(|&anchor| anchor == self.anchor)
            .unwrap_or(0);
        let step = if backward { -1isize } else { 1 };
        let mut index = from as isize;
        let next = loop {
            index += step;
            if index < 0 || index as usize >= TAB_ANCHORS.len() {
                break None;
            }
            let anchor = TAB_ANCHORS[index as usize];
            if present(anchor) {
                break Some(anchor);
            }
        };

        let Some(anchor) = next else {
            self.anchor = if backward {
                TabAnchor::Table
            } else {
                TabAnchor::FocusExit
            };
            return NavigationOutcome::PassThrough;
        };
        self.anchor = anchor;

        let section = match anchor {
            TabAnchor::Table | TabAnchor::FocusExit => return NavigationOutcome::PassThrough,
            TabAnchor::Header => GridSection::Header,
            TabAnchor::Body => GridSection::Body,
            TabAnchor::Footer => GridSection::Footer,
        };

        // Land on the section's first visible row. An empty body still takes
        // focus (its empty-state cell), addressed as row 0.
        let index = match section {
            GridSection::Header => (0..grid.header_row_count())
                .find(|&i| !grid.is_header_row_hidden(i))
                .unwrap_or(0),
            GridSection::Footer => (0..grid.footer_row_count())
                .find(|&i| !grid.is_footer_row_hidden(i))
                .unwrap_or(0),
            GridSection::Body => 0,
        };
        let row = RowPosition::row(index);
        let column_order = if self.mode == FocusMode::Cell {
            grid.row_column_orders(section, row).first().copied()
        } else {
            None
        };
        let target = FocusTarget {
            section,
            row,
            column_order,
        };
        self.focus = Some(target);
        self.memo_column_order = None;
        NavigationOutcome::Moved(target)
    }
}
