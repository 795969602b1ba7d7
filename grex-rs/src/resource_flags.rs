use bitflags::bitflags;

bitflags! {
    /// Provenance flags of a resource relative to its original container.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        /// The name was synthesized from the entry's position, not read from the directory.
        const PLACEHOLDER_NAME = 0x0001;
        /// The entry has been renamed since parsing.
        const RENAMED = 0x0002;
        /// The entry's content has been replaced with other bytes.
        const REPLACED = 0x0004;
        /// A reconciliation pass corrected the entry's offset.
        const RELOCATED = 0x0008;
    }
}

impl ResourceFlags {
    /// Returns `true` if the entry differs from what the original container declares.
    pub fn is_modified(self) -> bool {
        self.intersects(ResourceFlags::RENAMED | ResourceFlags::REPLACED)
    }
}
