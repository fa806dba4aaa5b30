use dicom_core::{Tag, VR};

// Standard attributes, named as in the DICOM data dictionary
pub use dicom_dictionary_std::tags::{
    ACQUISITION_CONTRAST, ACQUISITION_TIME, ECHO_TIME, IMAGE_TYPE, INSTANCE_NUMBER, MANUFACTURER,
    MANUFACTURER_MODEL_NAME, MODALITY, PATIENT_BIRTH_DATE, PATIENT_ID, PATIENT_NAME, PATIENT_SEX,
    PIXEL_DATA, PULSE_SEQUENCE_NAME, REPETITION_TIME, SEQUENCE_NAME, SERIES_DESCRIPTION,
    SERIES_INSTANCE_UID, SERIES_NUMBER, SOP_INSTANCE_UID, STUDY_DATE, STUDY_INSTANCE_UID,
    STUDY_TIME,
};

// Diffusion macro
pub const MR_DIFFUSION_SEQUENCE: Tag = Tag(0x0018, 0x9117);
pub const DIFFUSION_B_VALUE: Tag = Tag(0x0018, 0x9087);

// Vendor Private Tags
pub const PHILIPS_MR_SEQUENCE: Tag = Tag(0x2005, 0x140F);
pub const PHILIPS_B_VALUE: Tag = Tag(0x2001, 0x1003);
pub const SIEMENS_B_VALUE: Tag = Tag(0x0019, 0x100C);
pub const GE_PULSE_SEQUENCE: Tag = Tag(0x0019, 0x109F);
pub const GE_B_VALUE: Tag = Tag(0x0043, 0x1039);

/// Returns true for value representations that carry raw bytes rather
/// than text or numbers
pub fn is_binary_vr(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OW | VR::OF | VR::OD | VR::OL | VR::UN
    )
}
