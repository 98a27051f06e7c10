use hashbrown::HashSet;

/// Composite pairs currently being compared, as `(left address, right address)`.
///
/// The set is kept between comparisons so its allocation is reused.
#[derive(Debug, Default)]
pub struct TempPairSet(HashSet<(usize, usize)>);
impl TempPairSet {
	pub fn new() -> Self {
		Self(HashSet::new())
	}

	pub fn temp(&mut self) -> &mut HashSet<(usize, usize)> {
		// A comparison that bailed out early may have left pairs behind.
		self.0.clear();
		&mut self.0
	}

	/// Retrieves the cache set's capacity without clearing it first.
	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}
